use crate::command::{Command, Reply};
use crate::context::Context;
use crate::error::{ClientError, ClientResult};
use crate::traits::KvClient;

/// An ordered batch of commands executed in one round trip.
///
/// The index returned by [`queue`](Self::queue) is the position of that
/// command's reply in the vector returned by [`exec`](Self::exec).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pipeline {
    commands: Vec<Command>,
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a command and return its reply position.
    pub fn queue(&mut self, command: Command) -> usize {
        self.commands.push(command);
        self.commands.len() - 1
    }

    /// Number of queued commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// The queued commands, in order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Execute every queued command in one round trip.
    ///
    /// An empty pipeline performs no round trip. The reply count is verified
    /// against the command count.
    pub fn exec<C: KvClient + ?Sized>(
        self,
        client: &C,
        ctx: &Context,
    ) -> ClientResult<Vec<ClientResult<Reply>>> {
        if self.commands.is_empty() {
            ctx.check()?;
            return Ok(Vec::new());
        }
        let replies = client.execute(ctx, &self.commands)?;
        if replies.len() != self.commands.len() {
            return Err(ClientError::Protocol(format!(
                "pipeline of {} commands returned {} replies",
                self.commands.len(),
                replies.len()
            )));
        }
        Ok(replies)
    }
}

impl FromIterator<Command> for Pipeline {
    fn from_iter<I: IntoIterator<Item = Command>>(iter: I) -> Self {
        Self {
            commands: iter.into_iter().collect(),
        }
    }
}

impl Extend<Command> for Pipeline {
    fn extend<I: IntoIterator<Item = Command>>(&mut self, iter: I) {
        self.commands.extend(iter);
    }
}
