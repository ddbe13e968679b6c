//! Shared sockets for the built-in components
//!
//! Every built-in component is built against one [`Sockets`] value, so all
//! slots of the same type share one compatibility set.

use flow_engine::Socket;

/// The socket set used by the built-in components
///
/// `number` and `text` can both feed `any`; `number` can also feed `text`.
#[derive(Debug, Clone)]
pub struct Sockets {
    pub number: Socket,
    pub text: Socket,
    pub any: Socket,
}

impl Sockets {
    pub fn new() -> Self {
        let number = Socket::new("number", "Number", "A JSON number");
        let text = Socket::new("text", "Text", "A string");
        let any = Socket::new("any", "Any", "Any JSON value");

        number.combine_with(&any);
        number.combine_with(&text);
        text.combine_with(&any);

        Self { number, text, any }
    }
}

impl Default for Sockets {
    fn default() -> Self {
        Self::new()
    }
}
