//! Type checker over the enriched AST
//!
//! Expressions yield their type. Declarations yield nothing and are
//! checked internally; an error inside a declaration is recorded and
//! checking moves on to the next one. Uses the symbol table pass could not
//! resolve make the enclosing check incomplete, which is skipped silently
//! since the symbol table already reported it.

use crate::symbol_table::Analysis;
use crate::type_rels::TypeRels;
use fool_ast::{
    BinaryOp, ClassDec, ClassType, Declaration, Expr, ExprKind, MethodDec, Program, Type,
};
use std::collections::HashMap;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    /// A node was left unresolved by the symbol table pass
    #[error("incomplete tree")]
    Incomplete,

    #[error("{message} at line {line}")]
    Mismatch { message: String, line: usize },
}

impl TypeError {
    fn mismatch(message: impl Into<String>, line: usize) -> Self {
        Self::Mismatch {
            message: message.into(),
            line,
        }
    }
}

pub struct TypeChecker {
    rels: TypeRels,
    class_types: HashMap<String, ClassType>,
    errors: Vec<TypeError>,
}

impl TypeChecker {
    #[must_use]
    pub fn new(analysis: &Analysis) -> Self {
        Self {
            rels: analysis.hierarchy.clone(),
            class_types: analysis.class_types.clone(),
            errors: Vec::new(),
        }
    }

    /// Errors found inside declarations
    #[must_use]
    pub fn errors(&self) -> &[TypeError] {
        &self.errors
    }

    /// Check every declaration, then return the type of the main expression
    ///
    /// # Errors
    ///
    /// Returns `TypeError` if the main expression is ill-typed or could not
    /// be checked because of earlier errors
    pub fn check(&mut self, program: &Program) -> Result<Type, TypeError> {
        if let Program::LetIn { declarations, .. } = program {
            self.declarations(declarations);
        }
        let ty = self.expr(program.body());
        tracing::debug!(
            errors = self.errors.len(),
            ty = ?ty.as_ref().ok(),
            "type checking finished"
        );
        ty
    }

    fn report(&mut self, result: Result<(), TypeError>) {
        match result {
            Ok(()) | Err(TypeError::Incomplete) => {}
            Err(err) => {
                tracing::warn!("type checking error in a declaration: {err}");
                self.errors.push(err);
            }
        }
    }

    fn declarations(&mut self, declarations: &[Declaration]) {
        for dec in declarations {
            let result = self.declaration(dec);
            self.report(result);
        }
    }

    fn declaration(&mut self, dec: &Declaration) -> Result<(), TypeError> {
        match dec {
            Declaration::Var(var) => {
                let ty = self.expr(&var.value)?;
                if !self.rels.is_subtype(&ty, &var.ty) {
                    return Err(TypeError::mismatch(
                        format!("Incompatible value for variable {}", var.id),
                        var.line,
                    ));
                }
                Ok(())
            }
            Declaration::Fun(fun) => {
                self.declarations(&fun.declarations);
                let ty = self.expr(&fun.body)?;
                if !self.rels.is_subtype(&ty, &fun.ret) {
                    return Err(TypeError::mismatch(
                        format!("Wrong return type for function {}", fun.id),
                        fun.line,
                    ));
                }
                Ok(())
            }
            Declaration::Class(class) => {
                self.class(class);
                Ok(())
            }
        }
    }

    fn class(&mut self, class: &ClassDec) {
        for method in &class.methods {
            let result = self.method(method);
            self.report(result);
        }

        let (Some(layout), Some(super_entry)) = (&class.class_type, &class.super_entry) else {
            return;
        };
        let Type::Class(parent) = &super_entry.ty else {
            return;
        };

        for field in class.fields.iter().filter(|field| field.offset < 0) {
            let position = usize::try_from(-field.offset - 1).unwrap_or(usize::MAX);
            if let (Some(own), Some(inherited)) =
                (layout.all_fields.get(position), parent.all_fields.get(position))
            {
                if !self.rels.is_subtype(own, inherited) {
                    self.report(Err(TypeError::mismatch(
                        format!("Wrong overriding type for field {}", field.id),
                        field.line,
                    )));
                }
            }
        }

        for method in &class.methods {
            let position = usize::try_from(method.offset).unwrap_or(usize::MAX);
            if let (Some(own), Some(inherited)) =
                (layout.all_methods.get(position), parent.all_methods.get(position))
            {
                if !self.rels.is_arrow_subtype(own, inherited) {
                    self.report(Err(TypeError::mismatch(
                        format!("Wrong overriding type for method {}", method.id),
                        method.line,
                    )));
                }
            }
        }
    }

    fn method(&mut self, method: &MethodDec) -> Result<(), TypeError> {
        self.declarations(&method.declarations);
        let ty = self.expr(&method.body)?;
        if !self.rels.is_subtype(&ty, &method.ret) {
            return Err(TypeError::mismatch(
                format!("Wrong return type for method {}", method.id),
                method.line,
            ));
        }
        Ok(())
    }

    fn expr(&mut self, expr: &Expr) -> Result<Type, TypeError> {
        let line = expr.line;
        match &expr.kind {
            ExprKind::Int(_) => Ok(Type::Int),
            ExprKind::Bool(_) => Ok(Type::Bool),
            ExprKind::Null => Ok(Type::Empty),
            ExprKind::Binary { op, left, right } => {
                let left = self.expr(left)?;
                let right = self.expr(right)?;
                self.binary(*op, &left, &right, line)
            }
            ExprKind::Not(arg) => {
                let ty = self.expr(arg)?;
                if !self.rels.is_subtype(&ty, &Type::Bool) {
                    return Err(TypeError::mismatch("Non boolean after NOT", line));
                }
                Ok(Type::Bool)
            }
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.expr(cond)?;
                if !self.rels.is_subtype(&cond, &Type::Bool) {
                    return Err(TypeError::mismatch("Non boolean condition in if", line));
                }
                let then_type = self.expr(then_branch)?;
                let else_type = self.expr(else_branch)?;
                self.rels
                    .lowest_common_ancestor(&then_type, &else_type)
                    .ok_or_else(|| {
                        TypeError::mismatch("Incompatible types in then-else branches", line)
                    })
            }
            ExprKind::Print(arg) => self.expr(arg),
            ExprKind::Id(reference) => {
                let entry = reference.entry.as_ref().ok_or(TypeError::Incomplete)?;
                let usage = match entry.ty {
                    Type::Arrow(_) => "function",
                    Type::Method(_) => "method",
                    Type::Class(_) => "class",
                    _ => return Ok(entry.ty.clone()),
                };
                Err(TypeError::mismatch(
                    format!("Wrong usage of {usage} identifier {}", reference.id),
                    line,
                ))
            }
            ExprKind::Call { callee, args } => {
                let entry = callee.entry.as_ref().ok_or(TypeError::Incomplete)?;
                let (Type::Arrow(arrow) | Type::Method(arrow)) = &entry.ty else {
                    return Err(TypeError::mismatch(
                        format!("Invocation of a non-function {}", callee.id),
                        line,
                    ));
                };
                self.arguments(args, &arrow.params, "invocation", &callee.id, line)?;
                Ok((*arrow.ret).clone())
            }
            ExprKind::MethodCall {
                method,
                method_entry,
                args,
                ..
            } => {
                let entry = method_entry.as_ref().ok_or(TypeError::Incomplete)?;
                let Type::Method(arrow) = &entry.ty else {
                    return Err(TypeError::Incomplete);
                };
                self.arguments(args, &arrow.params, "invocation", method, line)?;
                Ok((*arrow.ret).clone())
            }
            ExprKind::New {
                class_id,
                entry,
                args,
            } => {
                if entry.is_none() {
                    return Err(TypeError::Incomplete);
                }
                let fields = self
                    .class_types
                    .get(class_id)
                    .map(|layout| layout.all_fields.clone())
                    .ok_or(TypeError::Incomplete)?;
                self.arguments(args, &fields, "instantiation", class_id, line)?;
                Ok(Type::Ref(class_id.clone()))
            }
        }
    }

    fn binary(
        &self,
        op: BinaryOp,
        left: &Type,
        right: &Type,
        line: usize,
    ) -> Result<Type, TypeError> {
        let both = |ty: &Type| self.rels.is_subtype(left, ty) && self.rels.is_subtype(right, ty);
        match op {
            BinaryOp::Plus | BinaryOp::Minus | BinaryOp::Times | BinaryOp::Div => {
                if !both(&Type::Int) {
                    let operation = match op {
                        BinaryOp::Plus => "sum",
                        BinaryOp::Minus => "subtraction",
                        BinaryOp::Times => "multiplication",
                        _ => "division",
                    };
                    return Err(TypeError::mismatch(
                        format!("Non integers in {operation}"),
                        line,
                    ));
                }
                Ok(Type::Int)
            }
            BinaryOp::And | BinaryOp::Or => {
                if !both(&Type::Bool) {
                    let operation = if op == BinaryOp::And { "and" } else { "or" };
                    return Err(TypeError::mismatch(
                        format!("Non boolean values in {operation}"),
                        line,
                    ));
                }
                Ok(Type::Bool)
            }
            BinaryOp::Equal | BinaryOp::GreaterEqual | BinaryOp::LessEqual => {
                if !(self.rels.is_subtype(left, right) || self.rels.is_subtype(right, left)) {
                    return Err(TypeError::mismatch(
                        format!("Incompatible types in {}", op.symbol()),
                        line,
                    ));
                }
                Ok(Type::Bool)
            }
        }
    }

    fn arguments(
        &mut self,
        args: &[Expr],
        params: &[Type],
        what: &str,
        id: &str,
        line: usize,
    ) -> Result<(), TypeError> {
        if args.len() != params.len() {
            return Err(TypeError::mismatch(
                format!("Wrong number of parameters in the {what} of {id}"),
                line,
            ));
        }
        for (i, (arg, param)) in args.iter().zip(params).enumerate() {
            let ty = self.expr(arg)?;
            if !self.rels.is_subtype(&ty, param) {
                return Err(TypeError::mismatch(
                    format!("Wrong type for {}-th parameter in the {what} of {id}", i + 1),
                    line,
                ));
            }
        }
        Ok(())
    }
}
