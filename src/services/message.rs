//! `GetMessage` and `Greet` handlers.

use async_trait::async_trait;
use tracing::debug;

use crate::dispatch::CallContext;
use crate::proto::{EchoReply, EchoRequest, Empty, Message, StringValue, pack_any};
use crate::routing::{Handler, HandlerError};

pub const GREETING_TYPE: &str = "Greeting";
pub const GREETING_TEXT: &str = "Hello from gRPC";

/// Returns a fixed greeting wrapped in a [`Message`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GetMessageHandler;

#[async_trait]
impl Handler for GetMessageHandler {
    type Request = Empty;
    type Response = Message;

    async fn handle(&self, _ctx: CallContext, _request: Empty) -> Result<Message, HandlerError> {
        Ok(Message {
            message_type: GREETING_TYPE.to_string(),
            message: Some(pack_any(&StringValue {
                value: GREETING_TEXT.to_string(),
            })),
            ..Default::default()
        })
    }
}

/// Echoes the request text back.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreetHandler;

#[async_trait]
impl Handler for GreetHandler {
    type Request = EchoRequest;
    type Response = EchoReply;

    async fn handle(&self, ctx: CallContext, request: EchoRequest) -> Result<EchoReply, HandlerError> {
        debug!(trace_id = %ctx.trace().trace_id(), len = request.text.len(), "Greet");
        Ok(EchoReply { text: request.text })
    }
}
