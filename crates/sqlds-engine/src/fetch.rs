//! FETCH execution and row mapping.
//!
//! A fetch runs in stages: count query, data query, row mapping, then one
//! nested fetch per deferred field and row. A plain fetch releases its session
//! before nested fetches start, and they acquire sessions of their own. A fetch
//! on an open session (a write's verification fetch) keeps nested fetches
//! against the same database on that session.

use indexmap::IndexMap;
use sqlds_core::{
    Criteria, DataSource, FieldValue, OperationType, Request, Response, SchemaError, SqlValue,
    TextMatchStyle,
};
use sqlds_query::{FetchAssembler, FetchPlan, FetchPlanner};
use sqlds_storage::StorageError;
use tracing::{debug, debug_span, Instrument};

use crate::engine::{BoxFuture, Session, SqlDataSourceEngine, finish};
use crate::error::EngineError;

/// Rows of one fetch, before mapping.
pub(crate) struct FetchedRows {
    plan: FetchPlan,
    rows: Vec<Vec<SqlValue>>,
    start_row: u64,
    total_rows: u64,
}

impl SqlDataSourceEngine {
    pub(crate) async fn fetch(
        &self,
        data_source: &DataSource,
        request: &Request,
        depth: usize,
    ) -> Result<Response, EngineError> {
        let mut session = self.session(data_source, false).await?;
        let fetched = self.query_rows(session.as_mut(), data_source, request).await;
        // Release the connection before any nested fetch.
        let fetched = finish(session, fetched).await?;
        self.map_rows(fetched, depth, None).await
    }

    /// Fetches on an open session, e.g. to verify a write before commit.
    pub(crate) async fn fetch_on(
        &self,
        session: &mut Session,
        data_source: &DataSource,
        request: &Request,
        depth: usize,
    ) -> Result<Response, EngineError> {
        let fetched = self.query_rows(&mut *session, data_source, request).await?;
        self.map_rows(fetched, depth, Some(session)).await
    }

    /// Boxed [`fetch_on`](Self::fetch_on), for nested fetches.
    fn fetch_nested<'a>(
        &'a self,
        session: &'a mut Session,
        data_source: &'a DataSource,
        request: &'a Request,
        depth: usize,
    ) -> BoxFuture<'a, Result<Response, EngineError>> {
        Box::pin(self.fetch_on(session, data_source, request, depth))
    }

    async fn query_rows(
        &self,
        session: &mut Session,
        data_source: &DataSource,
        request: &Request,
    ) -> Result<FetchedRows, EngineError> {
        let binding = data_source.binding_for(&OperationType::Fetch, request.operation_id.as_deref());
        let plan = FetchPlanner::new(self.resolver()).plan(data_source, request, binding)?;
        let assembled = FetchAssembler::new(&plan)
            .with_binding(binding)
            .with_text_match_style(
                request
                    .text_match_style
                    .unwrap_or(self.config.default_text_match_style),
            )
            .with_max_page_size(self.config.max_page_size)
            .assemble(request)?;

        let counted = session
            .fetch(&assembled.count)
            .instrument(debug_span!("count_query"))
            .await?;
        let total_rows = count_value(&counted, &assembled.count.sql)?;

        let rows = if assembled.limit == Some(0) {
            Vec::new()
        } else {
            let rows = session
                .fetch(&assembled.query)
                .instrument(debug_span!("data_query"))
                .await?;
            let skip = usize::try_from(assembled.skip_rows).unwrap_or(usize::MAX);
            rows.into_iter().skip(skip).collect()
        };

        debug!(
            data_source = %data_source.id,
            total_rows,
            rows = rows.len(),
            "Fetched rows"
        );

        Ok(FetchedRows {
            plan,
            rows,
            start_row: request.start_row,
            total_rows,
        })
    }

    async fn map_rows(
        &self,
        fetched: FetchedRows,
        depth: usize,
        mut session: Option<&mut Session>,
    ) -> Result<Response, EngineError> {
        let FetchedRows {
            plan,
            rows,
            start_row,
            total_rows,
        } = fetched;
        let types = plan.output_types();

        let mut data = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut values = Vec::with_capacity(plan.outputs.len());
            for (position, &item) in plan.outputs.iter().enumerate() {
                let raw = row.get(item).cloned().unwrap_or(SqlValue::Null(None));
                let value = FieldValue::from_sql(raw, types[position]).map_err(|message| {
                    EngineError::RowMapping {
                        field: plan.output_names[position].clone(),
                        message,
                    }
                })?;
                values.push(value);
            }

            for deferred in &plan.deferred {
                let key = row.get(deferred.key_item).cloned().unwrap_or(SqlValue::Null(None));
                values[deferred.output_index] = self
                    .sub_fetch(&plan, deferred, key, depth, session.as_deref_mut())
                    .instrument(debug_span!("sub_entity_fetch", field = %deferred.name))
                    .await?;
            }
            data.push(values);
        }

        Ok(Response::success(plan.output_names, data, start_row, total_rows))
    }

    async fn sub_fetch(
        &self,
        plan: &FetchPlan,
        deferred: &sqlds_query::DeferredField,
        key: SqlValue,
        depth: usize,
        session: Option<&mut Session>,
    ) -> Result<FieldValue, EngineError> {
        if key.is_null() {
            return Ok(FieldValue::Null);
        }
        if depth >= self.config.max_relation_depth {
            return Err(SchemaError::RelationChainTooDeep {
                field: format!("{}.{}", plan.data_source, deferred.name),
                max_depth: self.config.max_relation_depth,
            }
            .into());
        }

        let key_type = plan.items[deferred.key_item].field_type;
        let key = FieldValue::from_sql(key, key_type).map_err(|message| EngineError::RowMapping {
            field: deferred.relation.local_key_field.clone(),
            message,
        })?;

        let mut filter = IndexMap::new();
        filter.insert(deferred.relation.filter_field.clone(), key.to_json());
        let mut request = Request::fetch(deferred.relation.foreign_data_source.clone())
            .with_criteria(Criteria::Map(filter))
            .with_text_match_style(TextMatchStyle::ExactCase);
        if let Some(outputs) = &deferred.outputs {
            request = request.with_outputs(&outputs.join(","));
        }

        let response = match session {
            Some(session) => {
                let parent = self.registry.require(&plan.data_source)?;
                let foreign = self.registry.require(&request.data_source)?;
                if foreign.is_sql() && foreign.db_name == parent.db_name {
                    self.fetch_nested(session, &foreign, &request, depth + 1).await?
                } else {
                    self.dispatch(request, depth + 1).await?
                }
            }
            None => self.dispatch(request, depth + 1).await?,
        };
        Ok(FieldValue::Records(Box::new(response)))
    }
}

fn count_value(rows: &[Vec<SqlValue>], sql: &str) -> Result<u64, EngineError> {
    match rows.first().and_then(|r| r.first()) {
        Some(SqlValue::Integer(n)) => Ok(u64::try_from(*n).unwrap_or(0)),
        Some(SqlValue::Float(f)) if *f >= 0.0 => Ok(*f as u64),
        other => Err(StorageError::decode(
            "count(*)",
            format!("unexpected count result {other:?} for {sql}"),
        )
        .into()),
    }
}
