//! Subtyping relation between FOOL types

use fool_ast::{ArrowType, Type};
use std::collections::HashMap;

/// Class hierarchy and the subtype relation it induces
#[derive(Debug, Clone, Default)]
pub struct TypeRels {
    super_types: HashMap<String, String>,
}

impl TypeRels {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `class` extends `super_class`
    pub fn declare_super(&mut self, class: &str, super_class: &str) {
        self.super_types
            .insert(class.to_string(), super_class.to_string());
    }

    #[must_use]
    pub fn super_of(&self, class: &str) -> Option<&str> {
        self.super_types.get(class).map(String::as_str)
    }

    /// `class` followed by its superclasses, nearest first
    fn ancestors<'a>(&'a self, class: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        std::iter::successors(Some(class), |current| self.super_of(current))
            .take(self.super_types.len() + 1)
    }

    /// Whether `a <= b`
    #[must_use]
    pub fn is_subtype(&self, a: &Type, b: &Type) -> bool {
        match (a, b) {
            (Type::Bool, Type::Bool | Type::Int) | (Type::Int, Type::Int) => true,
            (Type::Empty, Type::Empty | Type::Ref(_)) => true,
            (Type::Ref(sub), Type::Ref(sup)) => self.ancestors(sub).any(|class| class == sup.as_str()),
            (Type::Arrow(sub), Type::Arrow(sup)) | (Type::Method(sub), Type::Method(sup)) => {
                self.is_arrow_subtype(sub, sup)
            }
            _ => false,
        }
    }

    /// Covariant in the return type, contravariant in the parameters
    #[must_use]
    pub fn is_arrow_subtype(&self, sub: &ArrowType, sup: &ArrowType) -> bool {
        sub.params.len() == sup.params.len()
            && self.is_subtype(&sub.ret, &sup.ret)
            && sub
                .params
                .iter()
                .zip(&sup.params)
                .all(|(sub_param, sup_param)| self.is_subtype(sup_param, sub_param))
    }

    /// Smallest common supertype of `a` and `b`, if there is one
    #[must_use]
    pub fn lowest_common_ancestor(&self, a: &Type, b: &Type) -> Option<Type> {
        if self.is_subtype(a, &Type::Int) && self.is_subtype(b, &Type::Int) {
            return if matches!(a, Type::Int) || matches!(b, Type::Int) {
                Some(Type::Int)
            } else {
                Some(Type::Bool)
            };
        }

        match (a, b) {
            (Type::Empty, Type::Empty | Type::Ref(_)) => Some(b.clone()),
            (Type::Ref(_), Type::Empty) => Some(a.clone()),
            (Type::Ref(class), Type::Ref(_)) => self
                .ancestors(class)
                .map(|ancestor| Type::Ref(ancestor.to_string()))
                .find(|ancestor| self.is_subtype(b, ancestor)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(id: &str) -> Type {
        Type::Ref(id.to_string())
    }

    fn hierarchy() -> TypeRels {
        // Animal <- Dog <- Puppy, Animal <- Cat, Plant
        let mut rels = TypeRels::new();
        rels.declare_super("Dog", "Animal");
        rels.declare_super("Puppy", "Dog");
        rels.declare_super("Cat", "Animal");
        rels
    }

    #[test]
    fn test_base_types() {
        let rels = TypeRels::new();
        assert!(rels.is_subtype(&Type::Bool, &Type::Int));
        assert!(rels.is_subtype(&Type::Int, &Type::Int));
        assert!(!rels.is_subtype(&Type::Int, &Type::Bool));
    }

    #[test]
    fn test_class_hierarchy() {
        let rels = hierarchy();
        assert!(rels.is_subtype(&class("Puppy"), &class("Animal")));
        assert!(rels.is_subtype(&class("Dog"), &class("Dog")));
        assert!(!rels.is_subtype(&class("Animal"), &class("Dog")));
        assert!(!rels.is_subtype(&class("Cat"), &class("Dog")));
        assert!(!rels.is_subtype(&class("Plant"), &class("Animal")));
    }

    #[test]
    fn test_null_is_subtype_of_every_class() {
        let rels = hierarchy();
        assert!(rels.is_subtype(&Type::Empty, &class("Cat")));
        assert!(!rels.is_subtype(&class("Cat"), &Type::Empty));
        assert!(!rels.is_subtype(&Type::Empty, &Type::Int));
    }

    #[test]
    fn test_arrow_variance() {
        let rels = hierarchy();
        let takes_animal = Type::Arrow(ArrowType::new(vec![class("Animal")], class("Puppy")));
        let takes_dog = Type::Arrow(ArrowType::new(vec![class("Dog")], class("Dog")));

        assert!(rels.is_subtype(&takes_animal, &takes_dog));
        assert!(!rels.is_subtype(&takes_dog, &takes_animal));

        let two_params = Type::Arrow(ArrowType::new(vec![class("Dog"), Type::Int], class("Dog")));
        assert!(!rels.is_subtype(&two_params, &takes_dog));
    }

    #[test]
    fn test_lowest_common_ancestor() {
        let rels = hierarchy();
        assert_eq!(
            rels.lowest_common_ancestor(&class("Puppy"), &class("Cat")),
            Some(class("Animal"))
        );
        assert_eq!(
            rels.lowest_common_ancestor(&class("Dog"), &class("Puppy")),
            Some(class("Dog"))
        );
        assert_eq!(
            rels.lowest_common_ancestor(&Type::Empty, &class("Cat")),
            Some(class("Cat"))
        );
        assert_eq!(rels.lowest_common_ancestor(&class("Cat"), &class("Plant")), None);
    }

    #[test]
    fn test_lowest_common_ancestor_base_types() {
        let rels = TypeRels::new();
        assert_eq!(
            rels.lowest_common_ancestor(&Type::Bool, &Type::Int),
            Some(Type::Int)
        );
        assert_eq!(
            rels.lowest_common_ancestor(&Type::Bool, &Type::Bool),
            Some(Type::Bool)
        );
        assert_eq!(rels.lowest_common_ancestor(&Type::Int, &class("Cat")), None);
    }
}
