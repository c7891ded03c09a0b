//! The adapter mapping log operations onto the chunk engine.

use crate::{
    format_row, project_header, ChannelMetadata, CurveRange, DecodeHeaderSnafu, DeleteSnafu,
    EncodeHeaderSnafu, EngineConfig, HeaderSnafu, InvalidRangeSnafu, LogData, LogHeader,
    LogQueryResult, LogShape, NotFoundSnafu, QueryContext, ReadSnafu, Result, ReturnElements,
    TransactionSnafu, UpdateSnafu, LOG_COLLECTION,
};
use channel_data::{chunk_records, ChannelDataReader, RecordMerger};
use chunk_store::ChunkStore;
use data_types::{extent_span, IndexRange};
use doc_store::{DbAction, DocumentStore, Filter, Transaction};
use observability_deps::tracing::{debug, info};
use snafu::{ensure, OptionExt, ResultExt};
use std::{collections::BTreeMap, sync::Arc};

/// Channel-data surface of a log.
///
/// One instance serves every log in the store; all state lives in the
/// document store, the adapter carries only a store handle and the engine
/// configuration.
#[derive(Debug, Clone)]
pub struct LogDataAdapter {
    store: Arc<dyn DocumentStore>,
    chunks: ChunkStore,
    config: EngineConfig,
}

impl LogDataAdapter {
    /// Create an adapter over `store`.
    pub fn new(store: Arc<dyn DocumentStore>, config: EngineConfig) -> Self {
        Self {
            chunks: ChunkStore::new(Arc::clone(&store)),
            store,
            config,
        }
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The header of `uri`, if the log exists.
    pub async fn get_header(&self, uri: &str) -> Result<Option<LogHeader>> {
        let documents = self
            .store
            .query(LOG_COLLECTION, &Filter::eq_ci("uri", uri), None)
            .await
            .context(HeaderSnafu)?;
        documents
            .into_iter()
            .next()
            .map(|doc| serde_json::from_value(doc).context(DecodeHeaderSnafu))
            .transpose()
    }

    /// Store a new log header.
    pub async fn add_log(&self, header: &LogHeader) -> Result<()> {
        let doc = serde_json::to_value(header).context(EncodeHeaderSnafu)?;
        self.store
            .insert(LOG_COLLECTION, doc)
            .await
            .context(HeaderSnafu)?;
        info!(uri = %header.uri, "added log header");
        Ok(())
    }

    /// Administrative listing of log headers, optionally narrowed by a
    /// query-string filter (`name=x&uidWell=y`).
    pub async fn list_logs(&self, query_string: Option<&str>) -> Result<Vec<LogHeader>> {
        let filter = query_string
            .map(Filter::from_query_string)
            .unwrap_or(Filter::All);
        let documents = self
            .store
            .query(LOG_COLLECTION, &filter, None)
            .await
            .context(HeaderSnafu)?;
        documents
            .into_iter()
            .map(|doc| serde_json::from_value(doc).context(DecodeHeaderSnafu))
            .collect()
    }

    /// Produce a log header with optionally embedded channel data.
    ///
    /// Data assembly fetches the overlapping chunks, reassembles the record
    /// stream, slices it by the requested mnemonics (the primary index is
    /// always kept), renders rows as strings, and echoes the observed index
    /// ranges of the returned slice back into the header. Context limits cut
    /// the result at a row boundary and set the truncation indicator.
    pub async fn query_logs(&self, uri: &str, ctx: &QueryContext) -> Result<LogQueryResult> {
        let header = self
            .get_header(uri)
            .await?
            .context(NotFoundSnafu { uri })?;
        let mut result_header = project_header(&header, ctx.return_elements);

        if !ctx.return_elements.includes_data() {
            return Ok(LogQueryResult {
                header: result_header,
                data: None,
                truncated: false,
            });
        }

        let assembled = match ctx.request_latest_values {
            Some(count) => self.assemble_latest(&header, ctx, count).await?,
            None => self.assemble_range(&header, ctx).await?,
        };

        let (data, truncated) = match assembled {
            Some(assembled) => assembled,
            None => {
                return Ok(LogQueryResult {
                    header: result_header,
                    data: None,
                    truncated: false,
                })
            }
        };

        // Echo the observed slice ranges. Identity projections carry no
        // curve metadata, so there is nothing to echo into.
        if matches!(
            ctx.return_elements,
            ReturnElements::All | ReturnElements::Requested
        ) {
            let returned: Vec<String> = data.echo.iter().map(|r| r.mnemonic.clone()).collect();
            result_header.log_curve_info.retain(|c| returned.contains(&c.mnemonic));
            for curve in &mut result_header.log_curve_info {
                curve.min_index = None;
                curve.max_index = None;
                curve.min_date_time_index = None;
                curve.max_date_time_index = None;
            }
            result_header.start_index = None;
            result_header.end_index = None;
            result_header.start_date_time_index = None;
            result_header.end_date_time_index = None;
            result_header.update_header_ranges(&data.echo, data.utc_offset_seconds);
        }

        Ok(LogQueryResult {
            header: result_header,
            data: Some(data.log_data),
            truncated,
        })
    }

    async fn assemble_range(
        &self,
        header: &LogHeader,
        ctx: &QueryContext,
    ) -> Result<Option<(AssembledData, bool)>> {
        let chunks = self
            .chunks
            .fetch(
                &header.uri,
                header.primary_mnemonic(),
                ctx.start_index,
                ctx.end_index,
                header.direction,
            )
            .await
            .context(ReadSnafu)?;
        if chunks.is_empty() {
            return Ok(None);
        }

        let reader = ChannelDataReader::from_chunks(&chunks)?;
        let sliced = match &ctx.mnemonics {
            Some(requested) => reader.slice(requested),
            None => reader,
        };

        let mut assembly = RowAssembly::new(header, &self.config, ctx, &sliced);
        for record in sliced.records() {
            let index = record.index();
            if let Some(start) = ctx.start_index {
                if header.direction.comes_before(index, start) {
                    continue;
                }
            }
            if let Some(end) = ctx.end_index {
                if header.direction.comes_before(end, index) {
                    break;
                }
            }
            if !assembly.push(&record) {
                break;
            }
        }
        Ok(Some(assembly.finish()))
    }

    /// Iterate the log in reversed direction, stopping once every channel
    /// has accumulated `count` values; rows come back in reversed order.
    async fn assemble_latest(
        &self,
        header: &LogHeader,
        ctx: &QueryContext,
        count: usize,
    ) -> Result<Option<(AssembledData, bool)>> {
        let chunks = self
            .chunks
            .fetch(
                &header.uri,
                header.primary_mnemonic(),
                ctx.start_index,
                ctx.end_index,
                header.direction,
            )
            .await
            .context(ReadSnafu)?;
        if chunks.is_empty() {
            return Ok(None);
        }

        let reader = ChannelDataReader::from_chunks(&chunks)?;
        let sliced = match &ctx.mnemonics {
            Some(requested) => reader.slice(requested),
            None => reader,
        };

        let columns = sliced.columns().len();
        let mut accumulated = vec![0usize; columns];
        let mut assembly = RowAssembly::new(header, &self.config, ctx, &sliced);
        for record in sliced.records_reversed() {
            let index = record.index();
            // Reversed iteration: rows beyond the end bound come first, rows
            // before the start bound end the scan.
            if let Some(end) = ctx.end_index {
                if header.direction.comes_before(end, index) {
                    continue;
                }
            }
            if let Some(start) = ctx.start_index {
                if header.direction.comes_before(index, start) {
                    break;
                }
            }
            let satisfied = (1..columns).all(|col| accumulated[col] >= count);
            if satisfied {
                break;
            }
            let contributes =
                (1..columns).any(|col| accumulated[col] < count && !record.is_null(col));
            if !contributes {
                continue;
            }
            for col in 1..columns {
                if !record.is_null(col) {
                    accumulated[col] += 1;
                }
            }
            if !assembly.push(&record) {
                break;
            }
        }
        Ok(Some(assembly.finish()))
    }

    /// Apply a batch of incoming readers to `uri`.
    ///
    /// Per reader: compute the update range, widen it to chunk-extent
    /// boundaries, fetch the overlapping chunks, merge, re-chunk and
    /// bulk-write under the shared transaction. Afterwards the header's
    /// per-curve and log-level ranges are widened to cover everything the
    /// readers carried. Header updates are only issued when at least one
    /// chunk was written.
    pub async fn update_data(&self, uri: &str, readers: Vec<ChannelDataReader>) -> Result<()> {
        let mut header = self
            .get_header(uri)
            .await?
            .context(NotFoundSnafu { uri })?;

        let transaction = Transaction::new(Arc::clone(&self.store));
        let mut affected: BTreeMap<String, CurveRange> = BTreeMap::new();
        let mut utc_offset_seconds = None;
        let mut wrote = false;

        for reader in readers {
            ensure!(
                reader.direction() == header.direction,
                InvalidRangeSnafu {
                    reason: format!(
                        "reader direction {:?} disagrees with log direction {:?}",
                        reader.direction(),
                        header.direction
                    ),
                }
            );
            ensure!(
                reader.primary_mnemonic() == header.primary_mnemonic(),
                InvalidRangeSnafu {
                    reason: format!(
                        "reader index curve '{}' is not the log's index curve '{}'",
                        reader.primary_mnemonic(),
                        header.primary_mnemonic()
                    ),
                }
            );
            self.check_units(&header, &reader)?;

            // An empty reader is a no-op.
            let update_range = match reader.index_range() {
                Some(range) => range,
                None => continue,
            };
            if utc_offset_seconds.is_none() {
                utc_offset_seconds = reader.indices()[0].utc_offset_seconds;
            }

            let range_size = self.config.range_size(reader.is_time_index());
            let existing_span = extent_span(update_range, range_size, header.direction);
            let existing_chunks = self
                .chunks
                .fetch(
                    uri,
                    header.primary_mnemonic(),
                    Some(existing_span.start),
                    Some(existing_span.end),
                    header.direction,
                )
                .await
                .context(ReadSnafu)?;
            debug!(
                uri,
                update_start = update_range.start,
                update_end = update_range.end,
                overlapping = existing_chunks.len(),
                "updating channel data",
            );

            let existing = if existing_chunks.is_empty() {
                None
            } else {
                Some(ChannelDataReader::from_chunks(&existing_chunks)?)
            };

            track_affected(&mut affected, &reader, update_range);

            let merger = RecordMerger::new(existing, reader, update_range)?;
            let columns = Arc::clone(merger.columns());
            let indices = merger.indices().to_vec();
            let chunks = chunk_records(merger, indices, range_size)?;
            if chunks.is_empty() {
                continue;
            }

            self.chunks
                .bulk_write(
                    uri,
                    chunks,
                    columns.mnemonics(),
                    columns.units(),
                    columns.null_values(),
                    Some(&transaction),
                )
                .await
                .context(UpdateSnafu)?;
            wrote = true;
        }

        if wrote {
            let updates: Vec<CurveRange> = affected.into_values().collect();
            header.update_header_ranges(&updates, utc_offset_seconds);

            transaction.attach(
                DbAction::Update,
                LOG_COLLECTION,
                uri,
                Some(header.uid.clone()),
            );
            transaction.save().await.context(TransactionSnafu)?;

            let doc = serde_json::to_value(&header).context(EncodeHeaderSnafu)?;
            self.store
                .update(LOG_COLLECTION, &Filter::eq_ci("uri", uri), doc)
                .await
                .context(HeaderSnafu)?;
            info!(uri, "updated log header index ranges");
        }

        transaction.commit().await.context(TransactionSnafu)?;
        Ok(())
    }

    /// Delete a log: its chunks, then its header, under one transaction.
    pub async fn delete_log(&self, uri: &str) -> Result<()> {
        let header = self
            .get_header(uri)
            .await?
            .context(NotFoundSnafu { uri })?;

        let transaction = Transaction::new(Arc::clone(&self.store));
        self.chunks
            .delete_by_uri(uri, Some(&transaction))
            .await
            .context(DeleteSnafu)?;

        transaction.attach(DbAction::Delete, LOG_COLLECTION, uri, Some(header.uid));
        transaction.save().await.context(TransactionSnafu)?;
        self.store
            .delete(LOG_COLLECTION, &Filter::eq_ci("uri", uri))
            .await
            .context(HeaderSnafu)?;

        transaction.commit().await.context(TransactionSnafu)?;
        info!(uri, "deleted log");
        Ok(())
    }

    /// Enumerate a log's channels for streaming consumers.
    ///
    /// The primary index curve is included only when the configuration asks
    /// for index/value pair streaming.
    pub async fn channel_metadata(&self, uri: &str) -> Result<Vec<ChannelMetadata>> {
        let header = self
            .get_header(uri)
            .await?
            .context(NotFoundSnafu { uri })?;
        let primary = header.primary_mnemonic().to_string();
        Ok(header
            .log_curve_info
            .iter()
            .filter(|curve| self.config.stream_index_value_pairs || curve.mnemonic != primary)
            .map(|curve| ChannelMetadata {
                mnemonic: curve.mnemonic.clone(),
                unit: curve.unit.clone(),
                null_value: curve.null_value.clone(),
                is_index: curve.mnemonic == primary,
            })
            .collect())
    }

    /// Reject readers whose units disagree with the header's curves.
    fn check_units(&self, header: &LogHeader, reader: &ChannelDataReader) -> Result<()> {
        let columns = reader.columns();
        for (col, mnemonic) in columns.mnemonics().iter().enumerate() {
            if let Some(curve) = header.curve(mnemonic) {
                let incoming = &columns.units()[col];
                if !curve.unit.is_empty() && !incoming.is_empty() && &curve.unit != incoming {
                    return Err(channel_data::Error::UnitMismatch {
                        mnemonic: mnemonic.clone(),
                        existing: curve.unit.clone(),
                        incoming: incoming.clone(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}

/// Widen the per-curve accumulator with everything `reader` carries.
fn track_affected(
    affected: &mut BTreeMap<String, CurveRange>,
    reader: &ChannelDataReader,
    update_range: IndexRange,
) {
    let columns = reader.columns();
    for (col, mnemonic) in columns.mnemonics().iter().enumerate() {
        let observed = if col == 0 {
            Some(update_range.min_max())
        } else {
            columns.channel_range(col).map(|r| r.min_max())
        };
        let observed = match observed {
            Some(range) => range,
            None => continue,
        };

        affected
            .entry(mnemonic.clone())
            .and_modify(|entry| {
                entry.range.widen(observed.start);
                entry.range.widen(observed.end);
            })
            .or_insert_with(|| CurveRange {
                mnemonic: mnemonic.clone(),
                unit: columns.units()[col].clone(),
                null_value: columns.null_values()[col].clone(),
                range: observed,
            });
    }
}

/// Rows under assembly plus the bookkeeping for limits and range echo.
struct RowAssembly {
    is_time_index: bool,
    utc_offset_seconds: Option<i32>,
    node_limit: usize,
    point_limit: usize,
    points: usize,
    truncated: bool,
    rows: Vec<String>,
    mnemonics: Vec<String>,
    units: Vec<String>,
    null_values: Vec<String>,
    observed: Vec<Option<IndexRange>>,
}

struct AssembledData {
    log_data: LogData,
    echo: Vec<CurveRange>,
    utc_offset_seconds: Option<i32>,
}

impl RowAssembly {
    fn new(
        header: &LogHeader,
        config: &EngineConfig,
        ctx: &QueryContext,
        sliced: &ChannelDataReader,
    ) -> Self {
        let columns = sliced.columns();
        Self {
            is_time_index: header.is_time_index(),
            utc_offset_seconds: sliced.indices()[0].utc_offset_seconds,
            node_limit: ctx.max_data_nodes.min(config.max_data_nodes),
            point_limit: ctx.max_data_points.min(config.max_data_points),
            points: 0,
            truncated: false,
            rows: vec![],
            mnemonics: columns.mnemonics().to_vec(),
            units: columns.units().to_vec(),
            null_values: columns.null_values().to_vec(),
            observed: vec![None; columns.len()],
        }
    }

    /// Append a record; returns `false` once a limit stops the assembly.
    fn push(&mut self, record: &channel_data::ChannelDataRecord) -> bool {
        let row_points = 1 + (1..record.values().len())
            .filter(|&col| !record.is_null(col))
            .count();
        if self.rows.len() >= self.node_limit || self.points + row_points > self.point_limit {
            self.truncated = true;
            return false;
        }

        let index = record.index();
        for (col, observed) in self.observed.iter_mut().enumerate() {
            let present = col == 0 || !record.is_null(col);
            if present {
                match observed {
                    Some(range) => range.widen(index),
                    None => *observed = Some(IndexRange::at(index)),
                }
            }
        }

        self.rows
            .push(format_row(record, self.is_time_index, self.utc_offset_seconds));
        self.points += row_points;
        true
    }

    fn finish(self) -> (AssembledData, bool) {
        let echo = self
            .observed
            .iter()
            .enumerate()
            .filter_map(|(col, observed)| {
                observed.map(|range| CurveRange {
                    mnemonic: self.mnemonics[col].clone(),
                    unit: self.units[col].clone(),
                    null_value: self.null_values[col].clone(),
                    range,
                })
            })
            .collect();

        let log_data = LogData {
            mnemonic_list: data_types::join_list(&self.mnemonics),
            unit_list: data_types::join_list(&self.units),
            data: self.rows,
        };
        (
            AssembledData {
                log_data,
                echo,
                utc_offset_seconds: self.utc_offset_seconds,
            },
            self.truncated,
        )
    }
}
