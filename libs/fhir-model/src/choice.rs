//! Choice fields
//!
//! A choice field (`value[x]`) holds exactly one node whose type is drawn
//! from a closed set. The schema stores the set; `declare_choice!` turns it
//! into a Rust enum so callers get exhaustive matching on the alternatives.

use crate::node::Node;

/// Closed set of alternatives for one choice field.
pub trait ChoiceType: Sized {
    /// Type codes of the alternatives, in schema order.
    const ALLOWED: &'static [&'static str];

    /// Wrap `node` in the matching variant, or `None` if its type is not an
    /// alternative.
    fn from_node(node: &Node) -> Option<Self>;

    fn type_name(&self) -> &'static str;

    fn node(&self) -> &Node;

    fn into_node(self) -> Node;
}

/// Suffix a type code contributes to a typed choice element name.
pub fn choice_type_suffix(code: &str) -> String {
    let mut chars = code.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().chain(chars).collect(),
    }
}

/// Typed element name of a choice field: `("value", "Quantity")` gives
/// `valueQuantity`, `("effective", "dateTime")` gives `effectiveDateTime`.
pub fn choice_element_name(base: &str, code: &str) -> String {
    format!("{}{}", base, choice_type_suffix(code))
}

/// Declare a closed enum over the alternatives of a choice field.
///
/// ```rust
/// use ferrum_model::{declare_choice, ChoiceType};
///
/// declare_choice! {
///     /// Coverage.costToBeneficiary.value[x]
///     pub enum CostValue {
///         Quantity => "Quantity",
///         Money => "Money",
///     }
/// }
///
/// assert_eq!(CostValue::ALLOWED, &["Quantity", "Money"]);
/// ```
#[macro_export]
macro_rules! declare_choice {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $code:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis enum $name {
            $($variant($crate::Node)),+
        }

        impl $crate::choice::ChoiceType for $name {
            const ALLOWED: &'static [&'static str] = &[$($code),+];

            fn from_node(node: &$crate::Node) -> Option<Self> {
                match node.type_name() {
                    $($code => Some(Self::$variant(node.clone())),)+
                    _ => None,
                }
            }

            fn type_name(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => $code),+
                }
            }

            fn node(&self) -> &$crate::Node {
                match self {
                    $(Self::$variant(n) => n),+
                }
            }

            fn into_node(self) -> $crate::Node {
                match self {
                    $(Self::$variant(n) => n),+
                }
            }
        }

        impl From<$name> for $crate::Node {
            fn from(choice: $name) -> Self {
                $crate::choice::ChoiceType::into_node(choice)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choice_element_name() {
        assert_eq!(choice_element_name("value", "Quantity"), "valueQuantity");
        assert_eq!(choice_element_name("value", "string"), "valueString");
        assert_eq!(choice_element_name("effective", "dateTime"), "effectiveDateTime");
        assert_eq!(choice_type_suffix(""), "");
    }
}
