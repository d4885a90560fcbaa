use battler_wamp_values::{
    Dictionary,
    List,
    Value,
};
use serde::Serialize;

/// Positional and keyword arguments of a call, invocation, or event.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Arguments {
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

impl Arguments {
    /// Creates a new set of arguments.
    pub fn new(arguments: List, arguments_keyword: Dictionary) -> Self {
        Self {
            arguments,
            arguments_keyword,
        }
    }

    /// Creates a new set of positional arguments.
    pub fn positional<I>(arguments: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Self {
            arguments: arguments.into_iter().collect(),
            arguments_keyword: Dictionary::default(),
        }
    }

    /// Adds a keyword argument.
    pub fn with_keyword<S>(mut self, key: S, value: Value) -> Self
    where
        S: Into<String>,
    {
        self.arguments_keyword.insert(key.into(), value);
        self
    }

    /// Checks if there are no arguments at all.
    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty() && self.arguments_keyword.is_empty()
    }
}

/// A positional argument slot when repeating an earlier invocation or publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// Reuse the original value at this position.
    Keep,
    Value(Value),
}

impl From<Value> for Slot {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// New arguments laid over the arguments of an earlier invocation or publication.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArgumentTemplate {
    pub arguments: Vec<Slot>,
    pub arguments_keyword: Dictionary,
}

impl ArgumentTemplate {
    /// Creates a template of positional slots.
    pub fn positional<I>(arguments: I) -> Self
    where
        I: IntoIterator<Item = Slot>,
    {
        Self {
            arguments: arguments.into_iter().collect(),
            arguments_keyword: Dictionary::default(),
        }
    }

    /// Adds a keyword argument.
    pub fn with_keyword<S>(mut self, key: S, value: Value) -> Self
    where
        S: Into<String>,
    {
        self.arguments_keyword.insert(key.into(), value);
        self
    }

    /// Applies the template to the original arguments.
    ///
    /// The result always has the same number of positional arguments as the original. Positions
    /// not covered by the template, or covered by [`Slot::Keep`], take the original value. Slots
    /// past the end of the original are dropped. Keyword arguments are merged over the original
    /// ones.
    pub fn apply(&self, original: &Arguments) -> Arguments {
        let arguments = original
            .arguments
            .iter()
            .enumerate()
            .map(|(i, original)| match self.arguments.get(i) {
                Some(Slot::Value(value)) => value.clone(),
                Some(Slot::Keep) | None => original.clone(),
            })
            .collect();
        let mut arguments_keyword = original.arguments_keyword.clone();
        arguments_keyword.extend(
            self.arguments_keyword
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        Arguments {
            arguments,
            arguments_keyword,
        }
    }
}

#[cfg(test)]
mod arguments_test {
    use battler_wamp_values::Value;

    use crate::core::arguments::{
        ArgumentTemplate,
        Arguments,
        Slot,
    };

    fn original() -> Arguments {
        Arguments::positional([
            Value::Integer(1),
            Value::String("two".to_owned()),
            Value::Bool(true),
        ])
        .with_keyword("a", Value::Integer(1))
    }

    #[test]
    fn keep_reuses_original_value() {
        let template = ArgumentTemplate::positional([
            Slot::Keep,
            Slot::Value(Value::String("changed".to_owned())),
            Slot::Keep,
        ]);
        pretty_assertions::assert_eq!(
            template.apply(&original()).arguments,
            vec![
                Value::Integer(1),
                Value::String("changed".to_owned()),
                Value::Bool(true),
            ]
        );
    }

    #[test]
    fn pads_missing_positions_from_original() {
        let template = ArgumentTemplate::positional([Slot::Value(Value::Integer(5))]);
        pretty_assertions::assert_eq!(
            template.apply(&original()).arguments,
            vec![
                Value::Integer(5),
                Value::String("two".to_owned()),
                Value::Bool(true),
            ]
        );
    }

    #[test]
    fn drops_positions_past_original_arity() {
        let template = ArgumentTemplate::positional([
            Slot::Keep,
            Slot::Keep,
            Slot::Keep,
            Slot::Value(Value::Integer(4)),
        ]);
        assert_eq!(template.apply(&original()).arguments.len(), 3);
    }

    #[test]
    fn merges_keyword_arguments() {
        let template = ArgumentTemplate::default()
            .with_keyword("a", Value::Integer(2))
            .with_keyword("b", Value::Integer(3));
        let applied = template.apply(&original());
        assert_eq!(applied.arguments_keyword.get("a"), Some(&Value::Integer(2)));
        assert_eq!(applied.arguments_keyword.get("b"), Some(&Value::Integer(3)));
        assert_eq!(applied.arguments, original().arguments);
    }

    #[test]
    fn empty_template_reproduces_original() {
        assert_eq!(ArgumentTemplate::default().apply(&original()), original());
    }
}
