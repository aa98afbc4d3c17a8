//! Scripting session handles
//!
//! Every object of the desktop automation API (3D modeler editor, material
//! definition manager, boundary setup module, ...) is reached through
//! [`ScriptObject`]. The handles are owned by the caller; this crate only
//! issues calls against them.
//!
//! [`RecordingSession`] is an in-process implementation that records calls
//! and answers queries from configured responses. It backs dry runs and the
//! tests.

use crate::token::Token;
use chipsim_core::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// A remote object of the scripting API
pub trait ScriptObject {
    /// Invoke `method` with positional `args`
    fn invoke(&mut self, method: &str, args: Vec<Token>) -> Result<Token>;
}

impl<T: ScriptObject + ?Sized> ScriptObject for Box<T> {
    fn invoke(&mut self, method: &str, args: Vec<Token>) -> Result<Token> {
        (**self).invoke(method, args)
    }
}

/// Invoke a method whose return value is not needed
pub(crate) fn call(object: &mut dyn ScriptObject, method: &str, args: Vec<Token>) -> Result<()> {
    tracing::debug!("{}({} args)", method, args.len());
    object.invoke(method, args)?;
    Ok(())
}

/// A recorded call
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Method name
    pub method: String,
    /// Positional arguments
    pub args: Vec<Token>,
}

impl Call {
    /// Render as a script statement against `object`
    pub fn to_script(&self, object: &str) -> String {
        let args: Vec<String> = self.args.iter().map(ToString::to_string).collect();
        format!("{}.{}({})", object, self.method, args.join(", "))
    }
}

type Responder = Box<dyn FnMut(&[Token]) -> Result<Token>>;

/// Session that records calls instead of forwarding them
pub struct RecordingSession {
    name: String,
    calls: Vec<Call>,
    responders: HashMap<String, Responder>,
}

impl RecordingSession {
    /// Create a session rendered as `name` in scripts (e.g. `oEditor`)
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: Vec::new(),
            responders: HashMap::new(),
        }
    }

    /// Always answer `method` with `response`
    pub fn respond(&mut self, method: &str, response: Token) {
        self.responders
            .insert(method.to_string(), Box::new(move |_| Ok(response.clone())));
    }

    /// Answer `method` by computing a response from the arguments
    pub fn respond_with<F>(&mut self, method: &str, responder: F)
    where
        F: FnMut(&[Token]) -> Token + 'static,
    {
        let mut responder = responder;
        self.responders
            .insert(method.to_string(), Box::new(move |args| Ok(responder(args))));
    }

    /// Make `method` fail with `message`
    pub fn fail_on(&mut self, method: &str, message: &str) {
        let method_name = method.to_string();
        let message = message.to_string();
        self.responders.insert(
            method.to_string(),
            Box::new(move |_| Err(Error::session(method_name.clone(), message.clone()))),
        );
    }

    /// Name used when rendering scripts
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All recorded calls, in order
    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Recorded calls of one method
    pub fn calls_to(&self, method: &str) -> Vec<&Call> {
        self.calls.iter().filter(|c| c.method == method).collect()
    }

    /// Recorded calls rendered as script statements
    pub fn script_lines(&self) -> Vec<String> {
        self.calls.iter().map(|c| c.to_script(&self.name)).collect()
    }

    /// Drop the recorded calls, keeping the responses
    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl fmt::Debug for RecordingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingSession")
            .field("name", &self.name)
            .field("calls", &self.calls)
            .field("responders", &self.responders.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ScriptObject for RecordingSession {
    fn invoke(&mut self, method: &str, args: Vec<Token>) -> Result<Token> {
        let response = match self.responders.get_mut(method) {
            Some(responder) => responder(&args)?,
            None => Token::Null,
        };
        self.calls.push(Call {
            method: method.to_string(),
            args,
        });
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens;

    #[test]
    fn test_records_and_renders() {
        let mut session = RecordingSession::new("oEditor");
        session
            .invoke("Delete", vec![Token::List(tokens!["NAME:Selections", "Selections:=", "Box1"])])
            .expect("recorded");

        assert_eq!(session.calls().len(), 1);
        assert_eq!(
            session.script_lines(),
            vec![r#"oEditor.Delete(["NAME:Selections", "Selections:=", "Box1"])"#]
        );
    }

    #[test]
    fn test_responses() {
        let mut session = RecordingSession::new("oEditor");
        session.respond("Paste", Token::List(tokens!["Box2"]));
        session.respond_with("GetMatchedObjectName", |args| {
            let pattern = args.first().and_then(Token::as_str).unwrap_or_default();
            Token::List(tokens![pattern.replace('*', "1")])
        });

        assert_eq!(
            session.invoke("Paste", Vec::new()).expect("answered"),
            Token::List(tokens!["Box2"])
        );
        let matched = session
            .invoke("GetMatchedObjectName", tokens!["signal_*"])
            .expect("answered");
        assert_eq!(matched.into_strings(), vec!["signal_1"]);
        assert_eq!(session.invoke("FitAll", Vec::new()).expect("answered"), Token::Null);
    }

    #[test]
    fn test_failures_are_not_recorded() {
        let mut session = RecordingSession::new("oEditor");
        session.fail_on("Unite", "no such object");

        let err = session.invoke("Unite", Vec::new()).unwrap_err();
        assert!(err.is_session_error());
        assert!(session.calls().is_empty());
    }
}
