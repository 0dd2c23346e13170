//! Built-in handlers and the default route set.

mod message;
mod webfinger;

pub use message::{GREETING_TEXT, GREETING_TYPE, GetMessageHandler, GreetHandler};
pub use webfinger::{WebFingerDocument, WebFingerHandler, WebFingerLinkDocument};

use crate::routing::RouteTableBuilder;

pub const GET_MESSAGE: &str = "GetMessage";
pub const GREET: &str = "Greet";
pub const WEBFINGER: &str = "WebFinger";

/// Builder pre-populated with the built-in routes on every protocol.
///
/// `web_port` is the port advertised in WebFinger answers.
pub fn default_routes(web_port: u16) -> RouteTableBuilder {
    RouteTableBuilder::new()
        .route(GET_MESSAGE, GetMessageHandler)
        .route(GREET, GreetHandler)
        .route(WEBFINGER, WebFingerHandler::new(web_port))
}
