//! Streaming handles returned to callers
//!
//! Both handles carry the operation context of the call that opened them:
//! once it ends, further reads or writes fail with an `io::Error` whose inner
//! error is the [`StorageError`].

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{BoxStream, StreamExt};
use object_store::buffered::BufWriter;
use object_store::{Attribute, Attributes, ObjectMeta};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

use crate::context::OperationContext;
use crate::errors::{Result, StorageError};

/// Readable object body
pub struct ObjectReader {
    meta: ObjectMeta,
    attributes: Attributes,
    inner: StreamReader<BoxStream<'static, io::Result<Bytes>>, Bytes>,
}

impl ObjectReader {
    pub(crate) fn new(
        meta: ObjectMeta,
        attributes: Attributes,
        body: BoxStream<'static, object_store::Result<Bytes>>,
        ctx: OperationContext,
    ) -> Self {
        let guarded = futures::stream::unfold(
            (body, ctx, false),
            |(mut body, ctx, failed)| async move {
                if failed {
                    return None;
                }
                let next = ctx.run(body.next()).await;
                match next {
                    Ok(Some(Ok(chunk))) => Some((Ok(chunk), (body, ctx, false))),
                    Ok(Some(Err(e))) => {
                        Some((Err(StorageError::from(e).into_io()), (body, ctx, true)))
                    }
                    Ok(None) => None,
                    Err(e) => Some((Err(e.into_io()), (body, ctx, true))),
                }
            },
        )
        .boxed();

        Self {
            meta,
            attributes,
            inner: StreamReader::new(guarded),
        }
    }

    /// Metadata of the object being read
    pub fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    /// Attributes stored with the object
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn content_type(&self) -> Option<&str> {
        self.attributes
            .get(&Attribute::ContentType)
            .map(|v| v.as_ref())
    }
}

impl AsyncRead for ObjectReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl std::fmt::Debug for ObjectReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectReader")
            .field("location", &self.meta.location)
            .field("size", &self.meta.size)
            .finish()
    }
}

/// Writable object body.
///
/// Nothing is visible in the store until `shutdown()` completes. Dropping
/// the writer before that discards what was written. If the call's context
/// ends while a write, flush or shutdown is pending, the upload is aborted
/// and the pending call fails.
pub struct ObjectWriter {
    state: WriterState,
    ctx: OperationContext,
    done: BoxFuture<'static, StorageError>,
    shutdown_started: bool,
}

enum WriterState {
    Open(BufWriter),
    Aborting(BoxFuture<'static, ()>),
    Ended,
}

impl ObjectWriter {
    pub(crate) fn new(inner: BufWriter, ctx: OperationContext) -> Self {
        let watched = ctx.clone();
        Self {
            state: WriterState::Open(inner),
            ctx,
            done: async move { watched.done().await }.boxed(),
            shutdown_started: false,
        }
    }

    /// Abandons the upload, cleaning up any parts already sent
    pub async fn abort(self) -> Result<()> {
        let shutdown_started = self.shutdown_started;
        match self.state {
            // a started shutdown owns the upload, dropping it is all that is left
            WriterState::Open(_) if shutdown_started => {}
            WriterState::Open(mut inner) => inner.abort().await?,
            WriterState::Aborting(cleanup) => cleanup.await,
            WriterState::Ended => {}
        }
        Ok(())
    }

    /// Ready with `Ok` while the upload may proceed. Once the context ends
    /// the upload is aborted, then every call fails with the context error.
    fn poll_ctx(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<&mut BufWriter>> {
        loop {
            match self.state {
                WriterState::Open(_) => {
                    if self.done.as_mut().poll(cx).is_pending() {
                        break;
                    }
                    let previous = std::mem::replace(&mut self.state, WriterState::Ended);
                    if let (WriterState::Open(mut inner), false) = (previous, self.shutdown_started) {
                        debug!("operation context ended, aborting upload");
                        self.state = WriterState::Aborting(
                            async move {
                                if let Err(e) = inner.abort().await {
                                    warn!(error = %e, "failed to abort upload");
                                }
                            }
                            .boxed(),
                        );
                    }
                }
                WriterState::Aborting(ref mut cleanup) => {
                    ready!(cleanup.as_mut().poll(cx));
                    self.state = WriterState::Ended;
                }
                WriterState::Ended => {
                    let err = self.ctx.err().unwrap_or(StorageError::Cancelled);
                    return Poll::Ready(Err(err.into_io()));
                }
            }
        }

        match &mut self.state {
            WriterState::Open(inner) => Poll::Ready(Ok(inner)),
            _ => Poll::Ready(Err(StorageError::Closed.into_io())),
        }
    }
}

impl AsyncWrite for ObjectWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let inner = ready!(self.get_mut().poll_ctx(cx))?;
        Pin::new(inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let inner = ready!(self.get_mut().poll_ctx(cx))?;
        Pin::new(inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let inner = ready!(this.poll_ctx(cx))?;
        let result = Pin::new(inner).poll_shutdown(cx);
        this.shutdown_started = true;
        result
    }
}

impl std::fmt::Debug for ObjectWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectWriter").finish_non_exhaustive()
    }
}
