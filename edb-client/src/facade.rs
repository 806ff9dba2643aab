//! The query facade bodies: `Execute`/`Query`/`QuerySingle`/
//! `QueryRequiredSingle`/`QueryJSON`/`QuerySingleJSON`/`QuerySQL`/`ExecuteSQL`.
//! Built once here so both the retrying [`crate::Client`] and the
//! non-retrying [`crate::transaction::Transaction`] handle run the exact same
//! bodies.

use std::sync::Arc;

use edb_errors::NoDataError;
use edb_protocol::common::{Capabilities, Cardinality, CompilationOptions, InputLanguage, IoFormat};
use edb_protocol::encoding::Annotations;
use edb_protocol::query_arg::QueryArgs;
use edb_protocol::value::Value;
use edb_protocol::QueryResult;

use crate::errors::{Error, ErrorKind, ProtocolError};
use crate::raw::{Connection, Response, State};

pub(crate) async fn execute<A>(
    conn: &mut Connection,
    query: &str,
    args: &A,
    state: &dyn State,
    annotations: &Arc<Annotations>,
) -> Result<Response<()>, Error>
where
    A: QueryArgs,
{
    conn.execute(query, args, state, annotations, Capabilities::ALL).await
}

pub(crate) async fn query<R, A>(
    conn: &mut Connection,
    query: &str,
    args: &A,
    state: &dyn State,
    annotations: &Arc<Annotations>,
) -> Result<Response<Vec<R>>, Error>
where
    R: QueryResult,
    A: QueryArgs,
{
    conn.query(
        query,
        args,
        state,
        annotations,
        Capabilities::ALL,
        IoFormat::Binary,
        Cardinality::Many,
    )
    .await
}

pub(crate) async fn query_single<R, A>(
    conn: &mut Connection,
    query: &str,
    args: &A,
    state: &dyn State,
    annotations: &Arc<Annotations>,
) -> Result<Response<Option<R>>, Error>
where
    R: QueryResult,
    A: QueryArgs,
{
    conn.query(
        query,
        args,
        state,
        annotations,
        Capabilities::ALL,
        IoFormat::Binary,
        Cardinality::AtMostOne,
    )
    .await?
    .map(|rows| Ok(rows.into_iter().next()))
}

pub(crate) async fn query_required_single<R, A>(
    conn: &mut Connection,
    query: &str,
    args: &A,
    state: &dyn State,
    annotations: &Arc<Annotations>,
) -> Result<Response<R>, Error>
where
    R: QueryResult,
    A: QueryArgs,
{
    conn.query(
        query,
        args,
        state,
        annotations,
        Capabilities::ALL,
        IoFormat::Binary,
        Cardinality::One,
    )
    .await?
    .map(|rows| rows.into_iter().next().ok_or_else(NoDataError::build))
}

fn take_json(value: Value) -> Result<String, Error> {
    match value {
        Value::Json(text) => Ok(text),
        other => Err(ProtocolError::with_message(format!(
            "expected a json result, got {other:?}"
        ))),
    }
}

pub(crate) async fn query_json<A>(
    conn: &mut Connection,
    query: &str,
    args: &A,
    state: &dyn State,
    annotations: &Arc<Annotations>,
) -> Result<Response<String>, Error>
where
    A: QueryArgs,
{
    conn.query::<Value, A>(
        query,
        args,
        state,
        annotations,
        Capabilities::ALL,
        IoFormat::Json,
        Cardinality::Many,
    )
    .await?
    .map(|rows| take_json(rows.into_iter().next().unwrap_or(Value::Json("[]".into()))))
}

pub(crate) async fn query_single_json<A>(
    conn: &mut Connection,
    query: &str,
    args: &A,
    state: &dyn State,
    annotations: &Arc<Annotations>,
) -> Result<Response<Option<String>>, Error>
where
    A: QueryArgs,
{
    conn.query::<Value, A>(
        query,
        args,
        state,
        annotations,
        Capabilities::ALL,
        IoFormat::Json,
        Cardinality::AtMostOne,
    )
    .await?
    .map(|rows| rows.into_iter().next().map(take_json).transpose())
}

/// `query`/`execute` with the command language set to SQL. The
/// granular-flow convenience methods on [`Connection`] hardcode EdgeQL, so
/// SQL goes through `parse` + `execute_stream` directly with a custom
/// [`CompilationOptions`].
pub(crate) async fn query_sql<R, A>(
    conn: &mut Connection,
    query: &str,
    args: &A,
    state: &dyn State,
    annotations: &Arc<Annotations>,
    expected_cardinality: Cardinality,
) -> Result<Response<Vec<R>>, Error>
where
    R: QueryResult,
    R::State: Unpin,
    A: QueryArgs,
{
    let flags = CompilationOptions {
        implicit_limit: None,
        implicit_typenames: false,
        implicit_typeids: false,
        explicit_objectids: true,
        allow_capabilities: Capabilities::ALL,
        io_format: IoFormat::Binary,
        input_language: InputLanguage::SQL,
        expected_cardinality,
    };
    let desc = conn.parse(&flags, query, state, annotations).await?;
    let stream = conn
        .execute_stream::<R, A>(&flags, query, state, annotations, &desc, args)
        .await?;
    stream.collect_response().await
}

pub(crate) async fn execute_sql<A>(
    conn: &mut Connection,
    query: &str,
    args: &A,
    state: &dyn State,
    annotations: &Arc<Annotations>,
) -> Result<Response<()>, Error>
where
    A: QueryArgs,
{
    query_sql::<Value, A>(conn, query, args, state, annotations, Cardinality::Many)
        .await?
        .map(|_| Ok(()))
}
