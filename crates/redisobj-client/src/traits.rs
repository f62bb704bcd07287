use std::sync::Arc;

use crate::command::{Command, Reply};
use crate::context::Context;
use crate::error::{ClientError, ClientResult};
use crate::pipeline::Pipeline;

/// A key-value store client.
///
/// All implementations must satisfy these invariants:
/// - `execute` performs exactly one round trip for the whole slice.
/// - The returned vector has one entry per command, in command order.
/// - A missing key is a successful [`Reply::Nil`] (or empty collection), never
///   an error.
/// - A failing command does not prevent later commands in the same round trip
///   from executing; their results are still returned.
/// - Transport failures, cancellation and deadlines fail the whole call.
pub trait KvClient: Send + Sync {
    /// Execute `commands` as one pipelined round trip.
    fn execute(
        &self,
        ctx: &Context,
        commands: &[Command],
    ) -> ClientResult<Vec<ClientResult<Reply>>>;

    /// Start a new pipeline for this client.
    fn pipeline(&self) -> Pipeline {
        Pipeline::new()
    }

    /// Execute a single command in its own round trip.
    fn execute_one(&self, ctx: &Context, command: Command) -> ClientResult<Reply> {
        let mut replies = self.execute(ctx, std::slice::from_ref(&command))?;
        match replies.pop() {
            Some(reply) if replies.is_empty() => reply,
            _ => Err(ClientError::Protocol(format!(
                "expected exactly one reply to {}",
                command.name()
            ))),
        }
    }
}

impl<T: KvClient + ?Sized> KvClient for &T {
    fn execute(
        &self,
        ctx: &Context,
        commands: &[Command],
    ) -> ClientResult<Vec<ClientResult<Reply>>> {
        (**self).execute(ctx, commands)
    }
}

impl<T: KvClient + ?Sized> KvClient for Arc<T> {
    fn execute(
        &self,
        ctx: &Context,
        commands: &[Command],
    ) -> ClientResult<Vec<ClientResult<Reply>>> {
        (**self).execute(ctx, commands)
    }
}

impl<T: KvClient + ?Sized> KvClient for Box<T> {
    fn execute(
        &self,
        ctx: &Context,
        commands: &[Command],
    ) -> ClientResult<Vec<ClientResult<Reply>>> {
        (**self).execute(ctx, commands)
    }
}
