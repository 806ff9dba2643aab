use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::time::Instant;

use edb_errors::fields::QueryText;
use edb_protocol::client_message::{ClientMessage, Parse};
use edb_protocol::client_message::Execute1;
use edb_protocol::common::CompilationOptions;
use edb_protocol::common::{Capabilities, Cardinality, InputLanguage, IoFormat};
use edb_protocol::descriptors::Typedesc;
use edb_protocol::encoding::Annotations;
use edb_protocol::features::ProtocolVersion;
use edb_protocol::model::Uuid;
use edb_protocol::query_arg::{Encoder, QueryArgs};
use edb_protocol::server_message::{CommandDataDescription1, Data, ServerMessage};
use edb_protocol::QueryResult;

use crate::errors::NoResultExpected;
use crate::errors::{ClientConnectionEosError, ProtocolEncodingError};
use crate::errors::{ClientInconsistentError, ProtocolOutOfOrderError};
use crate::errors::{Error, ErrorKind, ResultCardinalityMismatchError};
use crate::raw::connection::Mode;
use crate::raw::{Connection, PoolConnection, QueryCapabilities};
use crate::raw::{Description, Response, ResponseStream, State};

/// A previously-parsed command's shape, read back out of the per-connection
/// and process-wide caches in [`caches`](crate::caches) so a repeat of the
/// same query text can skip straight to `Execute1` (granular flow's
/// Optimistic mode).
struct CachedPlan {
    input_id: Uuid,
    output_id: Uuid,
    capabilities: Capabilities,
    input: Typedesc,
    output: Typedesc,
}

/// Decodes every data chunk in `data` against `out_desc`'s root shape.
fn decode_rows<R: QueryResult>(out_desc: &Typedesc, data: Vec<Data>) -> Result<Vec<R>, Error> {
    match out_desc.root_pos() {
        Some(root_pos) => {
            let ctx = out_desc.as_queryable_context();
            let mut state = R::prepare(&ctx, root_pos)?;
            data.into_iter()
                .flat_map(|chunk| chunk.data)
                .map(|chunk| R::decode(&mut state, &chunk))
                .collect::<Result<Vec<_>, _>>()
        }
        None => Err(NoResultExpected::build()),
    }
}

pub(crate) struct Guard;

impl Connection {
    pub(crate) fn begin_request(&mut self) -> Result<Guard, Error> {
        match self.mode {
            Mode::Normal { .. } => {
                self.mode = Mode::Dirty;
                Ok(Guard)
            }
            Mode::Dirty => Err(ClientInconsistentError::build()),
            // TODO(tailhook) technically we could just wait ping here
            Mode::AwaitingPing => Err(ClientInconsistentError::with_message("interrupted ping")),
        }
    }
    pub(crate) fn end_request(&mut self, _guard: Guard) {
        self.mode = Mode::Normal {
            idle_since: Instant::now(),
        };
    }
    pub(crate) async fn expect_ready(&mut self, guard: Guard) -> Result<(), Error> {
        loop {
            let msg = self.message().await?;

            // TODO(tailhook) should we react on messages somehow?
            //                At least parse LogMessage's?

            if let ServerMessage::ReadyForCommand(ready) = msg {
                self.transaction_state = ready.transaction_state;
                self.end_request(guard);
                return Ok(());
            }
        }
    }

    pub(crate) async fn expect_ready_or_eos(&mut self, guard: Guard) -> Result<(), Error> {
        match self.expect_ready(guard).await {
            Ok(()) => Ok(()),
            Err(e) if e.is::<ClientConnectionEosError>() => {
                assert!(!self.is_consistent());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
    /// Looks up the last compiled shape of `query` on this connection, if
    /// both the per-connection type-id cache and the process-wide descriptor
    /// cache still hold it.
    fn cached_plan(&self, query: &str) -> Option<CachedPlan> {
        let (input_id, output_id) = self.caches.type_ids(query)?;
        let capabilities = self.caches.capabilities(query)?;
        let desc_cache = crate::caches::desc_cache();
        let input = desc_cache.get(input_id)?;
        let output = desc_cache.get(output_id)?;
        Some(CachedPlan { input_id, output_id, capabilities, input, output })
    }

    /// Records a freshly-received `CommandDataDescription1` so the next call
    /// with the same query text can skip `Parse` entirely.
    fn remember_plan(&self, query: &str, desc: &CommandDataDescription1) -> Result<(), Error> {
        let input = desc.input().map_err(ProtocolEncodingError::with_source)?;
        let output = desc.output().map_err(ProtocolEncodingError::with_source)?;
        self.caches.store(query, desc.input.id, desc.output.id, desc.capabilities);
        let desc_cache = crate::caches::desc_cache();
        desc_cache.put(desc.input.id, input);
        desc_cache.put(desc.output.id, output);
        Ok(())
    }

    pub async fn parse(
        &mut self,
        flags: &CompilationOptions,
        query: &str,
        state: &dyn State,
        annotations: &Arc<Annotations>,
    ) -> Result<CommandDataDescription1, Error> {
        self._parse1(flags, query, state, annotations)
            .await
            .map_err(|e| e.set::<QueryText>(query))
    }
    async fn _parse1(
        &mut self,
        flags: &CompilationOptions,
        query: &str,
        state: &dyn State,
        annotations: &Arc<Annotations>,
    ) -> Result<CommandDataDescription1, Error> {
        let guard = self.begin_request()?;
        self.send_messages(&[
            ClientMessage::Parse(Parse::new(
                flags,
                query,
                state.encode(&self.state_desc)?,
                self.proto.is_3().then(|| annotations.clone()),
            )),
            ClientMessage::Sync,
        ])
        .await?;

        loop {
            let msg = self.message().await?;
            match msg {
                ServerMessage::StateDataDescription(d) => {
                    self.state_desc = d.typedesc;
                }
                ServerMessage::CommandDataDescription1(data_desc) => {
                    self.expect_ready(guard).await?;
                    return Ok(data_desc);
                }
                ServerMessage::ErrorResponse(err) => {
                    self.expect_ready_or_eos(guard)
                        .await
                        .map_err(|e| log::warn!("Error waiting for Ready after error: {e:#}"))
                        .ok();
                    return Err(err.into());
                }
                _ => {
                    return Err(ProtocolOutOfOrderError::with_message(format!(
                        "Unsolicited message {msg:?}"
                    )));
                }
            }
        }
    }

    /// Runs `Execute1` against whatever `(input_id, output_id)` the caller
    /// already believes is current — either just-returned by `parse`, or
    /// read back from [`Self::cached_plan`]. Returns the data chunks plus,
    /// if the server decided its compiled command no longer matches those
    /// ids, the fresh `CommandDataDescription1` it sent instead: a cache
    /// miss the caller must use to redecode the result and to refresh its
    /// caches (Optimistic mode's cache-invalidation signal).
    async fn _execute(
        &mut self,
        opts: &CompilationOptions,
        query: &str,
        state: &dyn State,
        annotations: &Arc<Annotations>,
        input_id: Uuid,
        output_id: Uuid,
        arguments: &Bytes,
    ) -> Result<(Response<Vec<Data>>, Option<CommandDataDescription1>), Error> {
        self._execute1(opts, query, state, annotations, input_id, output_id, arguments)
            .await
            .map_err(|e| e.set::<QueryText>(query))
    }

    #[allow(clippy::too_many_arguments)]
    async fn _execute1(
        &mut self,
        opts: &CompilationOptions,
        query: &str,
        state: &dyn State,
        annotations: &Arc<Annotations>,
        input_id: Uuid,
        output_id: Uuid,
        arguments: &Bytes,
    ) -> Result<(Response<Vec<Data>>, Option<CommandDataDescription1>), Error> {
        let guard = self.begin_request()?;
        self.send_messages(&[
            ClientMessage::Execute1(Execute1 {
                annotations: self.proto.is_3().then(|| annotations.clone()),
                allowed_capabilities: opts.allow_capabilities,
                compilation_flags: opts.flags(),
                implicit_limit: opts.implicit_limit,
                input_language: opts.input_language,
                output_format: opts.io_format,
                expected_cardinality: opts.expected_cardinality,
                command_text: query.into(),
                state: state.encode(&self.state_desc)?,
                input_typedesc_id: input_id,
                output_typedesc_id: output_id,
                arguments: arguments.clone(),
            }),
            ClientMessage::Sync,
        ])
        .await?;

        let mut data = Vec::new();
        let mut description = None;
        let mut warnings: Vec<edb_protocol::annotations::Warning> = Vec::new();
        loop {
            let msg = self.message().await?;
            match msg {
                ServerMessage::StateDataDescription(d) => {
                    self.state_desc = d.typedesc;
                }
                ServerMessage::CommandDataDescription1(desc) => {
                    warnings.extend(edb_protocol::annotations::decode_warnings(
                        &desc.annotations,
                    )?);
                    description = Some(desc);
                }
                ServerMessage::Data(datum) => {
                    data.push(datum);
                }
                ServerMessage::CommandComplete1(complete) => {
                    self.expect_ready(guard).await?;
                    let response = Response {
                        new_state: complete.state,
                        warnings,
                        ..Response::new(complete.status, data)
                    };
                    return Ok((response, description));
                }
                ServerMessage::ErrorResponse(err) => {
                    self.expect_ready_or_eos(guard)
                        .await
                        .map_err(|e| log::warn!("Error waiting for Ready after error: {e:#}"))
                        .ok();
                    let mut err: Error = err.into();
                    if let Some(desc) = description {
                        err = err.set::<Description>(desc);
                    }
                    return Err(err);
                }
                _ => {
                    return Err(ProtocolOutOfOrderError::with_message(format!(
                        "Unsolicited message {msg:?}"
                    )));
                }
            }
        }
    }

    pub async fn execute_stream<R, A>(
        &mut self,
        opts: &CompilationOptions,
        query: &str,
        state: &dyn State,
        annotations: &Arc<Annotations>,
        desc: &CommandDataDescription1,
        arguments: &A,
    ) -> Result<ResponseStream<R>, Error>
    where
        A: QueryArgs,
        R: QueryResult,
        R::State: Unpin,
    {
        let inp_desc = desc.input().map_err(ProtocolEncodingError::with_source)?;

        let mut arg_buf = BytesMut::with_capacity(8);
        arguments.encode(&mut Encoder::new(
            &inp_desc.as_query_arg_context(),
            &mut arg_buf,
        ))?;

        let guard = self.begin_request()?;
        self.send_messages(&[
            ClientMessage::Execute1(Execute1 {
                annotations: self.proto.is_3().then(|| annotations.clone()),
                allowed_capabilities: opts.allow_capabilities,
                compilation_flags: opts.flags(),
                implicit_limit: opts.implicit_limit,
                input_language: opts.input_language,
                output_format: opts.io_format,
                expected_cardinality: opts.expected_cardinality,
                command_text: query.into(),
                state: state.encode(&self.state_desc)?,
                input_typedesc_id: desc.input.id,
                output_typedesc_id: desc.output.id,
                arguments: arg_buf.freeze(),
            }),
            ClientMessage::Sync,
        ])
        .await?;

        let out_desc = desc.output().map_err(ProtocolEncodingError::with_source)?;
        ResponseStream::new(self, &out_desc, guard).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn try_execute_stream<R, A>(
        &mut self,
        opts: &CompilationOptions,
        query: &str,
        state: &dyn State,
        annotations: &Arc<Annotations>,
        input: &Typedesc,
        output: &Typedesc,
        arguments: &A,
    ) -> Result<ResponseStream<R>, Error>
    where
        A: QueryArgs,
        R: QueryResult,
        R::State: Unpin,
    {
        let mut arg_buf = BytesMut::with_capacity(8);
        arguments.encode(&mut Encoder::new(
            &input.as_query_arg_context(),
            &mut arg_buf,
        ))?;

        let guard = self.begin_request()?;
        self.send_messages(&[
            ClientMessage::Execute1(Execute1 {
                annotations: self.proto.is_3().then(|| annotations.clone()),
                allowed_capabilities: opts.allow_capabilities,
                compilation_flags: opts.flags(),
                implicit_limit: opts.implicit_limit,
                input_language: opts.input_language,
                output_format: opts.io_format,
                expected_cardinality: opts.expected_cardinality,
                command_text: query.into(),
                state: state.encode(&self.state_desc)?,
                input_typedesc_id: *input.id(),
                output_typedesc_id: *output.id(),
                arguments: arg_buf.freeze(),
            }),
            ClientMessage::Sync,
        ])
        .await?;

        ResponseStream::new(self, output, guard).await
    }
    pub async fn statement(
        &mut self,
        flags: &CompilationOptions,
        query: &str,
        state: &dyn State,
        annotations: &Arc<Annotations>,
    ) -> Result<(), Error> {
        self._statement1(flags, query, state, annotations).await
    }

    async fn _statement1(
        &mut self,
        opts: &CompilationOptions,
        query: &str,
        state: &dyn State,
        annotations: &Arc<Annotations>,
    ) -> Result<(), Error> {
        let guard = self.begin_request()?;
        self.send_messages(&[
            ClientMessage::Execute1(Execute1 {
                annotations: self.proto.is_3().then(|| annotations.clone()),
                allowed_capabilities: opts.allow_capabilities,
                compilation_flags: opts.flags(),
                implicit_limit: opts.implicit_limit,
                input_language: opts.input_language,
                output_format: opts.io_format,
                expected_cardinality: opts.expected_cardinality,
                command_text: query.into(),
                state: state.encode(&self.state_desc)?,
                input_typedesc_id: Uuid::from_u128(0),
                output_typedesc_id: Uuid::from_u128(0),
                arguments: Bytes::new(),
            }),
            ClientMessage::Sync,
        ])
        .await?;

        loop {
            let msg = self.message().await?;
            match msg {
                ServerMessage::StateDataDescription(d) => {
                    self.state_desc = d.typedesc;
                }
                ServerMessage::Data(_) => {}
                ServerMessage::CommandComplete1(..) => {
                    self.expect_ready(guard).await?;
                    return Ok(());
                }
                ServerMessage::ErrorResponse(err) => {
                    self.expect_ready_or_eos(guard)
                        .await
                        .map_err(|e| log::warn!("Error waiting for Ready after error: {e:#}"))
                        .ok();
                    return Err(err.into());
                }
                _ => {
                    return Err(ProtocolOutOfOrderError::with_message(format!(
                        "Unsolicited message {msg:?}"
                    )));
                }
            }
        }
    }
    
    #[allow(clippy::too_many_arguments)]
    pub async fn query<R, A>(
        &mut self,
        query: &str,
        arguments: &A,
        state: &dyn State,
        annotations: &Arc<Annotations>,
        allow_capabilities: Capabilities,
        io_format: IoFormat,
        cardinality: Cardinality,
    ) -> Result<Response<Vec<R>>, Error>
    where
        A: QueryArgs,
        R: QueryResult,
    {
        let mut caps = QueryCapabilities::Unparsed;
        let result = async {
            let flags = CompilationOptions {
                implicit_limit: None,
                implicit_typenames: false,
                implicit_typeids: false,
                explicit_objectids: true,
                allow_capabilities,
                io_format,
                input_language: InputLanguage::EdgeQL,
                expected_cardinality: cardinality,
            };

            // Optimistic mode: if this exact query text was compiled
            // before and both its type ids are still in the descriptor
            // cache, skip `Parse` and go straight to `Execute1` with the
            // cached ids.
            let (input_id, output_id, input, mut output) = match self.cached_plan(query) {
                Some(plan) => {
                    caps = QueryCapabilities::Parsed(plan.capabilities);
                    (plan.input_id, plan.output_id, plan.input, plan.output)
                }
                None => {
                    let desc = self.parse(&flags, query, state, annotations).await?;
                    caps = QueryCapabilities::Parsed(desc.capabilities);
                    let input = desc.input().map_err(ProtocolEncodingError::with_source)?;
                    let output = desc.output().map_err(ProtocolEncodingError::with_source)?;
                    self.remember_plan(query, &desc)?;
                    (desc.input.id, desc.output.id, input, output)
                }
            };

            let mut arg_buf = BytesMut::with_capacity(8);
            if let Err(e) = arguments.encode(&mut Encoder::new(
                &input.as_query_arg_context(),
                &mut arg_buf,
            )) {
                return Err(e);
            }

            let (response, refreshed) = self
                ._execute(
                    &flags,
                    query,
                    state,
                    annotations,
                    input_id,
                    output_id,
                    &arg_buf.freeze(),
                )
                .await?;
            response.log_warnings();

            // The ids we sent no longer match what the server has compiled
            // (a cache miss, or a schema change since this plan was
            // cached): redecode against the descriptor it sent back, and
            // refresh the caches so later calls pick up the new shape.
            if let Some(desc) = &refreshed {
                caps = QueryCapabilities::Parsed(desc.capabilities);
                output = desc.output().map_err(ProtocolEncodingError::with_source)?;
                self.remember_plan(query, desc)?;
            }

            let decoded = response.map(|data| decode_rows::<R>(&output, data))?;
            if matches!(cardinality, Cardinality::AtMostOne | Cardinality::One)
                && decoded.data.len() > 1
            {
                return Err(ResultCardinalityMismatchError::with_message(format!(
                    "expected {cardinality:?} but query returned {} elements",
                    decoded.data.len()
                )));
            }
            Ok(decoded)
        }
        .await;
        result.map_err(|e| e.set::<QueryCapabilities>(caps))
    }

    pub async fn execute<A>(
        &mut self,
        query: &str,
        arguments: &A,
        state: &dyn State,
        annotations: &Arc<Annotations>,
        allow_capabilities: Capabilities,
    ) -> Result<Response<()>, Error>
    where
        A: QueryArgs,
    {
        let mut caps = QueryCapabilities::Unparsed;
        let result: Result<_, Error> = async {
            let flags = CompilationOptions {
                implicit_limit: None,
                implicit_typenames: false,
                implicit_typeids: false,
                explicit_objectids: true,
                allow_capabilities,
                input_language: InputLanguage::EdgeQL,
                io_format: IoFormat::Binary,
                expected_cardinality: Cardinality::Many,
            };

            let (input_id, output_id, input) = match self.cached_plan(query) {
                Some(plan) => {
                    caps = QueryCapabilities::Parsed(plan.capabilities);
                    (plan.input_id, plan.output_id, plan.input)
                }
                None => {
                    let desc = self.parse(&flags, query, state, annotations).await?;
                    caps = QueryCapabilities::Parsed(desc.capabilities);
                    let input = desc.input().map_err(ProtocolEncodingError::with_source)?;
                    self.remember_plan(query, &desc)?;
                    (desc.input.id, desc.output.id, input)
                }
            };

            let mut arg_buf = BytesMut::with_capacity(8);
            if let Err(e) = arguments.encode(&mut Encoder::new(
                &input.as_query_arg_context(),
                &mut arg_buf,
            )) {
                return Err(e);
            }

            let (response, refreshed) = self
                ._execute(
                    &flags,
                    query,
                    state,
                    annotations,
                    input_id,
                    output_id,
                    &arg_buf.freeze(),
                )
                .await?;
            response.log_warnings();

            if let Some(desc) = &refreshed {
                caps = QueryCapabilities::Parsed(desc.capabilities);
                self.remember_plan(query, desc)?;
            }

            response.map(|_| Ok::<_, Error>(()))
        }
        .await;
        result.map_err(|e| e.set::<QueryCapabilities>(caps))
    }
}

impl PoolConnection {
    pub async fn parse(
        &mut self,
        flags: &CompilationOptions,
        query: &str,
        state: &dyn State,
        annotations: &Arc<Annotations>,
    ) -> Result<CommandDataDescription1, Error> {
        self.inner().parse(flags, query, state, annotations).await
    }
    pub async fn execute(
        &mut self,
        opts: &CompilationOptions,
        query: &str,
        state: &dyn State,
        annotations: &Arc<Annotations>,
        desc: &CommandDataDescription1,
        arguments: &Bytes,
    ) -> Result<Vec<Data>, Error> {
        self.inner()
            ._execute(opts, query, state, annotations, desc.input.id, desc.output.id, arguments)
            .await
            .map(|(r, _)| r.data)
    }
    pub async fn statement(
        &mut self,
        query: &str,
        state: &dyn State,
        annotations: &Arc<Annotations>,
    ) -> Result<(), Error> {
        let flags = CompilationOptions {
            implicit_limit: None,
            implicit_typenames: false,
            implicit_typeids: false,
            explicit_objectids: false,
            allow_capabilities: Capabilities::ALL,
            input_language: InputLanguage::EdgeQL,
            io_format: IoFormat::Binary,
            expected_cardinality: Cardinality::Many, // no result is unsupported
        };
        self.inner().statement(&flags, query, state, annotations).await
    }
    pub fn proto(&self) -> &ProtocolVersion {
        &self
            .inner
            .as_ref()
            .expect("connection is not dropped")
            .proto
    }
    pub fn inner(&mut self) -> &mut Connection {
        self.inner.as_mut().expect("connection is not dropped")
    }
}
