use std::{
    fmt::Display,
    time::SystemTime,
};

use battler_wamp_repl::{
    core::{
        arguments::Arguments,
        state::ActionState,
    },
    session::Readiness,
};
use chrono::{
    DateTime,
    Local,
};

/// Formats arguments as JSON, with keyword arguments after positional arguments.
pub fn arguments(arguments: &Arguments) -> String {
    let positional = serde_json::to_string(&arguments.arguments);
    let keyword = serde_json::to_value(&arguments.arguments_keyword)
        .and_then(|keyword| serde_json::to_string(&keyword));
    match (positional, keyword) {
        (Ok(positional), Ok(_)) if arguments.arguments_keyword.is_empty() => positional,
        (Ok(positional), Ok(keyword)) => format!("{positional} {keyword}"),
        (Err(err), _) | (_, Err(err)) => format!("<{err}>"),
    }
}

/// Formats a timestamp in local time.
pub fn timestamp(timestamp: SystemTime) -> String {
    DateTime::<Local>::from(timestamp)
        .format("%Y-%m-%d %H:%M:%S%.3f")
        .to_string()
}

/// Formats the state of an action, showing a successful result with the given function.
pub fn action_state<T, F>(state: &ActionState<T>, show: F) -> String
where
    F: Fn(&T) -> Option<String>,
{
    match state {
        ActionState::Succeeded(value) => match show(value) {
            Some(value) => format!("{} ({value})", state.status()),
            None => state.status().to_string(),
        },
        ActionState::Failed(err) | ActionState::Aborted(err) => {
            format!("{}: {err}", state.status())
        }
        _ => state.status().to_string(),
    }
}

pub fn readiness(readiness: &Readiness) -> String {
    match readiness {
        Readiness::Establishing => "establishing".to_owned(),
        Readiness::Ready(_) => "ready".to_owned(),
        Readiness::Failed(err) => format!("failed: {err}"),
    }
}

/// A titled list of fields describing an entity.
pub struct Details {
    title: String,
    fields: Vec<(&'static str, String)>,
}

impl Details {
    pub fn new<S>(title: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            title: title.into(),
            fields: Vec::new(),
        }
    }

    pub fn field<V>(mut self, key: &'static str, value: V) -> Self
    where
        V: Display,
    {
        self.fields.push((key, value.to_string()));
        self
    }

    /// Adds a field only if the value is present.
    pub fn optional_field<V>(self, key: &'static str, value: Option<V>) -> Self
    where
        V: Display,
    {
        match value {
            Some(value) => self.field(key, value),
            None => self,
        }
    }
}

impl Display for Details {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title)?;
        let width = self
            .fields
            .iter()
            .map(|(key, _)| key.len())
            .max()
            .unwrap_or_default();
        for (key, value) in &self.fields {
            write!(f, "\n  {key:<width$}  {value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod format_test {
    use battler_wamp_repl::core::{
        arguments::Arguments,
        error::SharedError,
        state::ActionState,
    };
    use battler_wamp_values::Value;

    use crate::format::{
        Details,
        action_state,
        arguments,
    };

    #[test]
    fn formats_arguments_as_json() {
        assert_eq!(arguments(&Arguments::default()), "[]");
        assert_eq!(
            arguments(
                &Arguments::positional([Value::Integer(1), Value::String("a".to_owned())])
                    .with_keyword("z", Value::Bool(true))
                    .with_keyword("a", Value::List(Vec::new()))
            ),
            r#"[1,"a"] {"a":[],"z":true}"#
        );
    }

    #[test]
    fn formats_action_states() {
        assert_eq!(action_state(&ActionState::<u64>::Pending, |_| None), "pending");
        assert_eq!(
            action_state(&ActionState::Succeeded(7u64), |id| Some(format!("id {id}"))),
            "succeeded (id 7)"
        );
        assert_eq!(
            action_state(
                &ActionState::<()>::Failed(SharedError::from(anyhow::Error::msg(
                    "wamp.error.no_such_procedure"
                ))),
                |_| None
            ),
            "failed: wamp.error.no_such_procedure"
        );
    }

    #[test]
    fn aligns_detail_fields() {
        let details = Details::new("call local.alice.add")
            .field("procedure", "com.example.add")
            .field("invocations", 2)
            .optional_field::<u64>("timeout", None);
        pretty_assertions::assert_eq!(
            details.to_string(),
            "call local.alice.add\n  procedure    com.example.add\n  invocations  2"
        );
    }
}
