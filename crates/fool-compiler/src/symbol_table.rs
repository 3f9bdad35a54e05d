//! Symbol table pass
//!
//! Resolves every identifier use to the entry of its declaration, assigns
//! frame, field and dispatch-table offsets, and builds class layouts.
//! Errors are collected and never stop the pass, so one run reports all of
//! them; unresolved uses are left without an entry.

use crate::type_rels::TypeRels;
use fool_ast::{
    ClassDec, ClassType, Declaration, Expr, ExprKind, FunDec, MethodDec, Param, Program,
    Reference, SymbolEntry, Type,
};
use std::collections::{HashMap, HashSet};

type Scope = HashMap<String, SymbolEntry>;

/// Symbol table errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    #[error("{kind} id {id} at line {line} already declared")]
    AlreadyDeclared {
        kind: &'static str,
        id: String,
        line: usize,
    },

    #[error("{kind} id {id} at line {line} not declared")]
    NotDeclared {
        kind: &'static str,
        id: String,
        line: usize,
    },

    #[error("Object id {id} at line {line} is not an object")]
    NotAnObject { id: String, line: usize },

    #[error("Method id {method} at line {line} not declared in class {class}")]
    MethodNotDeclared {
        class: String,
        method: String,
        line: usize,
    },

    #[error("Field id {id} at line {line} already declared as method")]
    FieldOverridesMethod { id: String, line: usize },

    #[error("Method id {id} at line {line} already declared as field")]
    MethodOverridesField { id: String, line: usize },
}

impl SymbolError {
    #[must_use]
    pub const fn line(&self) -> usize {
        match self {
            Self::AlreadyDeclared { line, .. }
            | Self::NotDeclared { line, .. }
            | Self::NotAnObject { line, .. }
            | Self::MethodNotDeclared { line, .. }
            | Self::FieldOverridesMethod { line, .. }
            | Self::MethodOverridesField { line, .. } => *line,
        }
    }
}

/// Result of the symbol table pass
#[derive(Debug, Default)]
pub struct Analysis {
    pub errors: Vec<SymbolError>,
    /// Class hierarchy, consumed by the type checker
    pub hierarchy: TypeRels,
    /// Complete layout of every declared class
    pub class_types: HashMap<String, ClassType>,
}

pub struct SymbolTable {
    scopes: Vec<Scope>,
    /// Virtual table of every class declared so far
    virtual_tables: HashMap<String, Scope>,
    class_types: HashMap<String, ClassType>,
    /// Every class name in the program, for validating reference types
    class_names: HashSet<String>,
    hierarchy: TypeRels,
    nesting_level: usize,
    /// Next offset for a declaration at the current nesting level
    decl_offset: i32,
    errors: Vec<SymbolError>,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scopes: Vec::new(),
            virtual_tables: HashMap::new(),
            class_types: HashMap::new(),
            class_names: HashSet::new(),
            hierarchy: TypeRels::new(),
            nesting_level: 0,
            decl_offset: -2,
            errors: Vec::new(),
        }
    }

    /// Enrich `program` in place
    pub fn enrich(mut self, program: &mut Program) -> Analysis {
        self.scopes.push(Scope::new());
        match program {
            Program::LetIn { declarations, body } => {
                self.class_names = declarations
                    .iter()
                    .filter_map(|dec| match dec {
                        Declaration::Class(class) => Some(class.id.clone()),
                        _ => None,
                    })
                    .collect();
                for dec in declarations.iter_mut() {
                    self.declaration(dec);
                }
                self.expr(body);
            }
            Program::Expression(body) => self.expr(body),
        }
        self.scopes.pop();

        tracing::debug!(errors = self.errors.len(), "symbol table pass finished");
        Analysis {
            errors: self.errors,
            hierarchy: self.hierarchy,
            class_types: self.class_types,
        }
    }

    fn lookup(&self, id: &str) -> Option<SymbolEntry> {
        self.scopes.iter().rev().find_map(|scope| scope.get(id)).cloned()
    }

    fn next_offset(&mut self) -> i32 {
        let offset = self.decl_offset;
        self.decl_offset -= 1;
        offset
    }

    fn declare(&mut self, kind: &'static str, id: &str, entry: SymbolEntry, line: usize) {
        let duplicate = self
            .scopes
            .last_mut()
            .is_some_and(|scope| scope.insert(id.to_string(), entry).is_some());
        if duplicate {
            self.errors.push(SymbolError::AlreadyDeclared {
                kind,
                id: id.to_string(),
                line,
            });
        }
    }

    fn check_type(&mut self, ty: &Type, line: usize) {
        if let Type::Ref(class) = ty {
            if !self.class_names.contains(class) {
                self.errors.push(SymbolError::NotDeclared {
                    kind: "Class",
                    id: class.clone(),
                    line,
                });
            }
        }
    }

    /// Opens a scope one level deeper; returns the offset counter to restore
    fn enter_scope(&mut self, scope: Scope) -> i32 {
        self.nesting_level += 1;
        self.scopes.push(scope);
        std::mem::replace(&mut self.decl_offset, -2)
    }

    fn exit_scope(&mut self, saved_offset: i32) {
        self.scopes.pop();
        self.nesting_level -= 1;
        self.decl_offset = saved_offset;
    }

    fn declaration(&mut self, dec: &mut Declaration) {
        match dec {
            Declaration::Var(var) => {
                self.expr(&mut var.value);
                self.check_type(&var.ty, var.line);
                let entry = SymbolEntry::new(self.nesting_level, var.ty.clone(), self.next_offset());
                self.declare("Var", &var.id, entry, var.line);
            }
            Declaration::Fun(fun) => self.function(fun),
            Declaration::Class(class) => self.class(class),
        }
    }

    fn function(&mut self, fun: &mut FunDec) {
        tracing::trace!(id = %fun.id, level = self.nesting_level, "function");
        self.check_type(&fun.ret, fun.line);
        let entry = SymbolEntry::new(
            self.nesting_level,
            Type::Arrow(fun.arrow_type()),
            self.next_offset(),
        );
        self.declare("Fun", &fun.id, entry, fun.line);

        let saved = self.enter_scope(Scope::new());
        self.body(&fun.params, &mut fun.declarations, &mut fun.body);
        self.exit_scope(saved);
    }

    /// Parameters, local declarations and body of a function or method
    fn body(&mut self, params: &[Param], declarations: &mut [Declaration], body: &mut Expr) {
        for (offset, param) in (1..).zip(params) {
            self.check_type(&param.ty, param.line);
            let entry = SymbolEntry::new(self.nesting_level, param.ty.clone(), offset);
            self.declare("Par", &param.id, entry, param.line);
        }
        for dec in declarations.iter_mut() {
            self.declaration(dec);
        }
        self.expr(body);
    }

    fn class(&mut self, class: &mut ClassDec) {
        tracing::trace!(id = %class.id, "class");
        let mut virtual_table = Scope::new();
        let mut class_type = ClassType::default();

        if let Some(super_id) = &class.super_id {
            match self.virtual_tables.get(super_id) {
                Some(table) => {
                    virtual_table = table.clone();
                    class_type = self.class_types.get(super_id).cloned().unwrap_or_default();
                    class.super_entry = self.scopes[0].get(super_id).cloned();
                }
                None => self.errors.push(SymbolError::NotDeclared {
                    kind: "Super class",
                    id: super_id.clone(),
                    line: class.line,
                }),
            }
        }

        let offset = self.next_offset();
        let redeclared = self.scopes[0].contains_key(&class.id);
        if redeclared {
            self.errors.push(SymbolError::AlreadyDeclared {
                kind: "Class",
                id: class.id.clone(),
                line: class.line,
            });
        } else if let (Some(super_id), Some(_)) = (&class.super_id, &class.super_entry) {
            self.hierarchy.declare_super(&class.id, super_id);
        }

        // Members live at nesting level 1
        let member_level = self.nesting_level + 1;
        let mut members = HashSet::new();

        for field in &mut class.fields {
            self.check_type(&field.ty, field.line);
            if !members.insert(field.id.clone()) {
                self.errors.push(SymbolError::AlreadyDeclared {
                    kind: "Field",
                    id: field.id.clone(),
                    line: field.line,
                });
                continue;
            }
            let offset = match virtual_table.get(&field.id) {
                Some(inherited) if matches!(inherited.ty, Type::Method(_)) => {
                    self.errors.push(SymbolError::FieldOverridesMethod {
                        id: field.id.clone(),
                        line: field.line,
                    });
                    continue;
                }
                Some(inherited) => {
                    let position = field_position(inherited.offset);
                    class_type.all_fields[position] = field.ty.clone();
                    inherited.offset
                }
                None => {
                    class_type.all_fields.push(field.ty.clone());
                    field_offset(class_type.all_fields.len() - 1)
                }
            };
            field.offset = offset;
            virtual_table.insert(
                field.id.clone(),
                SymbolEntry::new(member_level, field.ty.clone(), offset),
            );
        }

        // Every method is registered before any body is visited, so methods
        // can call each other regardless of declaration order
        let mut visit = Vec::with_capacity(class.methods.len());
        for method in &mut class.methods {
            visit.push(self.register_method(
                method,
                &mut members,
                &mut virtual_table,
                &mut class_type,
                member_level,
            ));
        }

        class.class_type = Some(class_type.clone());
        self.scopes[0].insert(
            class.id.clone(),
            SymbolEntry::new(self.nesting_level, Type::Class(class_type.clone()), offset),
        );
        self.class_types.insert(class.id.clone(), class_type);
        self.virtual_tables
            .insert(class.id.clone(), virtual_table.clone());

        self.nesting_level = member_level;
        self.scopes.push(virtual_table);
        for (method, visit) in class.methods.iter_mut().zip(visit) {
            if visit {
                self.method(method);
            }
        }
        self.scopes.pop();
        self.nesting_level = member_level - 1;
    }

    /// Adds `method` to the virtual table; returns whether its body should be visited
    fn register_method(
        &mut self,
        method: &mut MethodDec,
        members: &mut HashSet<String>,
        virtual_table: &mut Scope,
        class_type: &mut ClassType,
        member_level: usize,
    ) -> bool {
        self.check_type(&method.ret, method.line);
        if !members.insert(method.id.clone()) {
            self.errors.push(SymbolError::AlreadyDeclared {
                kind: "Method",
                id: method.id.clone(),
                line: method.line,
            });
            return false;
        }

        let arrow = method.arrow_type();
        let offset = match virtual_table.get(&method.id) {
            Some(inherited) if !matches!(inherited.ty, Type::Method(_)) => {
                self.errors.push(SymbolError::MethodOverridesField {
                    id: method.id.clone(),
                    line: method.line,
                });
                return false;
            }
            Some(inherited) => {
                class_type.all_methods[dispatch_position(inherited.offset)] = arrow.clone();
                inherited.offset
            }
            None => {
                class_type.all_methods.push(arrow.clone());
                dispatch_offset(class_type.all_methods.len() - 1)
            }
        };
        method.offset = offset;
        virtual_table.insert(
            method.id.clone(),
            SymbolEntry::new(member_level, Type::Method(arrow), offset),
        );
        true
    }

    fn method(&mut self, method: &mut MethodDec) {
        tracing::trace!(id = %method.id, offset = method.offset, "method");
        let saved = self.enter_scope(Scope::new());
        self.body(&method.params, &mut method.declarations, &mut method.body);
        self.exit_scope(saved);
    }

    fn resolve(&mut self, reference: &mut Reference, kind: &'static str, line: usize) {
        match self.lookup(&reference.id) {
            Some(entry) => {
                reference.entry = Some(entry);
                reference.nesting_level = self.nesting_level;
            }
            None => self.errors.push(SymbolError::NotDeclared {
                kind,
                id: reference.id.clone(),
                line,
            }),
        }
    }

    fn expr(&mut self, expr: &mut Expr) {
        let line = expr.line;
        match &mut expr.kind {
            ExprKind::Int(_) | ExprKind::Bool(_) | ExprKind::Null => {}
            ExprKind::Binary { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            ExprKind::Not(arg) | ExprKind::Print(arg) => self.expr(arg),
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.expr(cond);
                self.expr(then_branch);
                self.expr(else_branch);
            }
            ExprKind::Id(reference) => self.resolve(reference, "Var or Par", line),
            ExprKind::Call { callee, args } => {
                self.resolve(callee, "Fun", line);
                for arg in args {
                    self.expr(arg);
                }
            }
            ExprKind::MethodCall {
                object,
                method,
                method_entry,
                args,
            } => {
                self.method_call(object, method, method_entry, line);
                for arg in args {
                    self.expr(arg);
                }
            }
            ExprKind::New {
                class_id,
                entry,
                args,
            } => {
                if self.virtual_tables.contains_key(class_id.as_str()) {
                    *entry = self.scopes[0].get(class_id.as_str()).cloned();
                } else {
                    self.errors.push(SymbolError::NotDeclared {
                        kind: "Class",
                        id: class_id.clone(),
                        line,
                    });
                }
                for arg in args {
                    self.expr(arg);
                }
            }
        }
    }

    fn method_call(
        &mut self,
        object: &mut Reference,
        method: &str,
        method_entry: &mut Option<SymbolEntry>,
        line: usize,
    ) {
        let Some(entry) = self.lookup(&object.id) else {
            self.errors.push(SymbolError::NotDeclared {
                kind: "Object",
                id: object.id.clone(),
                line,
            });
            return;
        };
        let Type::Ref(class) = &entry.ty else {
            self.errors.push(SymbolError::NotAnObject {
                id: object.id.clone(),
                line,
            });
            return;
        };
        let found = self
            .virtual_tables
            .get(class)
            .and_then(|table| table.get(method))
            .filter(|found| matches!(found.ty, Type::Method(_)))
            .cloned();
        match found {
            Some(found) => {
                *method_entry = Some(found);
                object.entry = Some(entry);
                object.nesting_level = self.nesting_level;
            }
            None => self.errors.push(SymbolError::MethodNotDeclared {
                class: class.clone(),
                method: method.to_string(),
                line,
            }),
        }
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Offset from the object pointer of the field at `position` in `all_fields`
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
const fn field_offset(position: usize) -> i32 {
    -(position as i32) - 1
}

#[allow(clippy::cast_sign_loss)]
const fn field_position(offset: i32) -> usize {
    (-offset - 1) as usize
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
const fn dispatch_offset(position: usize) -> i32 {
    position as i32
}

#[allow(clippy::cast_sign_loss)]
const fn dispatch_position(offset: i32) -> usize {
    offset as usize
}
