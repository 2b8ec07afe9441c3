use tokio::io::{AsyncRead, AsyncWrite};

use super::framed::{FramedConnection, Structured};
use super::reply::{FileInfo, StatusReply};
use super::{ACTIVE_FILE_COMMAND, STATUS_COMMAND};
use crate::error::Error;

/// Command/response exchange on top of a [`FramedConnection`].
///
/// One poller lives for exactly one firmware session; any error it returns
/// leaves the connection in an unknown framing state and the caller is
/// expected to drop it and reconnect.
pub struct StatusPoller<S> {
    conn: FramedConnection<S>,
}

impl<S> StatusPoller<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(conn: FramedConnection<S>) -> Self {
        Self { conn }
    }

    /// Request machine status and wait for the JSON reply.
    pub async fn poll(&mut self) -> Result<Structured<StatusReply>, Error> {
        self.conn.send_command(STATUS_COMMAND).await?;
        self.conn.read_structured_record().await
    }

    /// Ask which file the running job was started from.
    pub async fn query_active_file(&mut self) -> Result<Structured<FileInfo>, Error> {
        self.conn.send_command(ACTIVE_FILE_COMMAND).await?;
        self.conn.read_structured_record().await
    }
}
