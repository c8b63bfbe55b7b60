//! The streaming `multipart/form-data` path.
//!
//! A [`MultipartSession`] pulls frames off the body one at a time, feeds them
//! to the [`MultipartDecoder`] and routes every part as soon as its bytes
//! are known: field values into a [`FieldTree`], file content into an
//! [`Upload`] on disk. The running total of received bytes is checked
//! before each frame is handed to the codec, so an oversized body is never
//! read further than the frame which crossed the limit.

use std::io;
use std::path::PathBuf;
use std::pin::pin;

use bytes::{Bytes, BytesMut};
use http_body::Body;
use http_body_util::BodyExt;
use indexmap::IndexMap;
use tokio_util::codec::Decoder;
use tracing::{debug, trace, warn};

use super::upload::{self, Upload};
use crate::codec::{MultipartDecoder, PartHeader, PartItem};
use crate::fields::FieldTree;
use crate::protocol::{BodyError, DecodedBody, FileField, QueryStringOptions, UploadLimits, UploadOptions};
use crate::ensure;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum SessionState {
    Idle,
    /// Size checks only happen while streaming
    Streaming,
    Completed,
    /// The body grew past the cumulative limit
    Aborted,
    Failed,
}

/// The part currently being read.
#[derive(Debug)]
enum CurrentPart {
    Field { name: String, value: BytesMut },
    File(Upload),
    /// A file input which was submitted without selecting a file
    Skipped,
}

pub(crate) struct MultipartSession<'a> {
    state: SessionState,
    limits: UploadLimits,
    uploads: &'a UploadOptions,
    decoder: MultipartDecoder,
    buffer: BytesMut,
    received: u64,
    field_count: usize,
    tree: FieldTree,
    files: IndexMap<String, FileField>,
    current: Option<CurrentPart>,
    /// Every file created by this session, removed again when it fails
    created: Vec<PathBuf>,
}

impl<'a> MultipartSession<'a> {
    pub(crate) fn new(boundary: &str, limits: UploadLimits, uploads: &'a UploadOptions, qs: &QueryStringOptions) -> Self {
        Self {
            state: SessionState::Idle,
            limits,
            uploads,
            decoder: MultipartDecoder::new(boundary),
            buffer: BytesMut::new(),
            received: 0,
            field_count: 0,
            tree: qs.field_tree(),
            files: IndexMap::new(),
            current: None,
            created: Vec::new(),
        }
    }

    /// Reads the whole body, consuming the session.
    ///
    /// Either every part was decoded, or the error is returned and no file
    /// written by this session is left behind.
    pub(crate) async fn decode<B>(mut self, body: B) -> Result<DecodedBody, BodyError>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        match self.stream(body).await {
            Ok(()) => {
                self.state = SessionState::Completed;
                debug!(received = self.received, fields = self.field_count, files = self.files.len(), "multipart body decoded");
                Ok(DecodedBody { fields: self.tree.finalize(), files: self.files, raw: None })
            }
            Err(e) => {
                self.state = if e.is_payload_too_large() { SessionState::Aborted } else { SessionState::Failed };
                warn!(state = ?self.state, received = self.received, cause = %e, "multipart body decoding stopped");
                self.current = None;
                upload::remove_all(&self.created).await;
                Err(e)
            }
        }
    }

    async fn stream<B>(&mut self, body: B) -> Result<(), BodyError>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let hint = body.size_hint();
        self.state = SessionState::Streaming;
        self.check_size(hint.exact().unwrap_or(hint.lower()))?;

        let mut body = pin!(body);
        while !self.decoder.is_finished() {
            let Some(frame) = body.frame().await else {
                break;
            };

            let frame = frame.map_err(|e| BodyError::io(io::Error::other(e.into())))?;
            let Ok(data) = frame.into_data() else {
                // trailers carry no part data
                continue;
            };

            self.received += data.len() as u64;
            self.check_size(self.received)?;

            self.buffer.extend_from_slice(&data);
            while let Some(item) = self.decoder.decode(&mut self.buffer)? {
                self.on_item(item).await?;
            }
        }

        ensure!(self.decoder.is_finished(), BodyError::invalid_multipart("multipart body ended before the closing boundary"));
        Ok(())
    }

    fn check_size(&self, received: u64) -> Result<(), BodyError> {
        debug_assert_eq!(self.state, SessionState::Streaming);

        let limit = self.limits.max_cumulative_bytes;
        ensure!(received <= limit, BodyError::payload_too_large(received, limit));
        Ok(())
    }

    async fn on_item(&mut self, item: PartItem) -> Result<(), BodyError> {
        match item {
            PartItem::Header(header) => self.start_part(header).await,
            PartItem::Chunk(bytes) => {
                match &mut self.current {
                    Some(CurrentPart::Field { value, .. }) => value.extend_from_slice(&bytes),
                    Some(CurrentPart::File(upload)) => upload.write(&bytes).await?,
                    Some(CurrentPart::Skipped) | None => {}
                }
                Ok(())
            }
            PartItem::PartEnd => self.end_part().await,
            PartItem::Eof => {
                trace!("multipart body reached its closing boundary");
                Ok(())
            }
        }
    }

    async fn start_part(&mut self, header: PartHeader) -> Result<(), BodyError> {
        let part = match header.filename() {
            Some("") => {
                debug!(name = header.name(), "skip file part without file name");
                CurrentPart::Skipped
            }
            Some(filename) => {
                let dir = self.uploads.upload_dir();
                let upload = Upload::create(
                    &dir,
                    header.name().to_owned(),
                    filename.to_owned(),
                    header.content_type().map(str::to_owned),
                )
                .await?;
                self.created.push(upload.path().to_path_buf());
                CurrentPart::File(upload)
            }
            None => {
                self.field_count += 1;
                let max_field_count = self.limits.max_field_count;
                ensure!(self.field_count <= max_field_count, BodyError::too_many_fields(max_field_count));
                CurrentPart::Field { name: header.name().to_owned(), value: BytesMut::new() }
            }
        };

        self.current = Some(part);
        Ok(())
    }

    async fn end_part(&mut self) -> Result<(), BodyError> {
        match self.current.take() {
            Some(CurrentPart::Field { name, value }) => {
                let value = String::from_utf8_lossy(&value).into_owned();
                self.tree.add(&name, value)?;
            }
            Some(CurrentPart::File(upload)) => {
                let meta = upload.finish().await?;
                trace!(field = meta.field_name, size = meta.size_bytes, "multipart file stored");

                if self.uploads.multiple {
                    match self.files.get_mut(&meta.field_name) {
                        Some(field) => field.push(meta),
                        None => {
                            self.files.insert(meta.field_name.clone(), FileField::One(meta));
                        }
                    }
                } else if let Some(replaced) = self.files.insert(meta.field_name.clone(), FileField::One(meta)) {
                    let paths: Vec<PathBuf> = replaced.iter().map(|meta| meta.stored_path.clone()).collect();
                    upload::remove_all(&paths).await;
                }
            }
            Some(CurrentPart::Skipped) | None => {}
        }
        Ok(())
    }
}
