//! Derivation entry point
//!
//! One call derives one (symbol, year, timeframe) bar file and its manifest.
//! The run is synchronous; independent jobs touch disjoint output paths.

use super::{DataLayout, DeriveError, Progress, SYMBOLOGY_FILE};
use crate::bars::{
    aggregate_quote_file, aggregate_trade_file, fill_gaps, resample, CanonicalBar, MinuteTable,
    Reconciler, SessionLabeler, Timeframe,
};
use crate::config::Config;
use crate::data::{write_bars, OutputFormat};
use crate::manifest::{count_surrogate, sha256_file, DerivationManifest, DeriveParams};
use crate::telemetry::{self, CounterMetric};
use crate::ticks::{
    discover_tick_files, InstrumentId, RowStats, StreamKind, Symbology, TickError, TickFile,
    TickReader, TickReaderOptions,
};
use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::time::Instant;

/// Regular-hours filter applied when a command leaves `rth_only` unset
pub fn default_rth_only(timeframe: Timeframe) -> bool {
    timeframe == Timeframe::OneDay
}

/// Parameters of one derivation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeriveRequest {
    pub symbol: String,
    pub year: i32,
    /// Window start; defaults to January 1st of `year`
    pub from_date: Option<NaiveDate>,
    /// Window end; defaults to December 31st of `year`
    pub to_date: Option<NaiveDate>,
    pub timeframe: Timeframe,
    pub output_format: OutputFormat,
    pub fill_gaps: bool,
    pub rth_only: bool,
    /// Re-derive even when an up-to-date manifest exists
    pub force: bool,
}

impl DeriveRequest {
    pub fn new(symbol: impl Into<String>, year: i32) -> Self {
        Self {
            symbol: symbol.into(),
            year,
            from_date: None,
            to_date: None,
            timeframe: Timeframe::OneMinute,
            output_format: OutputFormat::Parquet,
            fill_gaps: false,
            rth_only: false,
            force: false,
        }
    }

    pub fn with_window(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.from_date = from;
        self.to_date = to;
        self
    }

    pub fn with_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = timeframe;
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn with_fill_gaps(mut self, fill_gaps: bool) -> Self {
        self.fill_gaps = fill_gaps;
        self
    }

    pub fn with_rth_only(mut self, rth_only: bool) -> Self {
        self.rth_only = rth_only;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Effective date window: the requested bounds clipped to `year`
    pub fn window(&self) -> Result<(NaiveDate, NaiveDate), DeriveError> {
        let bounds = NaiveDate::from_ymd_opt(self.year, 1, 1)
            .zip(NaiveDate::from_ymd_opt(self.year, 12, 31));
        let Some((year_start, year_end)) = bounds else {
            return Err(DeriveError::InvalidWindow {
                year: self.year,
                from: self.from_date.unwrap_or(NaiveDate::MIN),
                to: self.to_date.unwrap_or(NaiveDate::MAX),
            });
        };

        let from = self.from_date.map_or(year_start, |d| d.max(year_start));
        let to = self.to_date.map_or(year_end, |d| d.min(year_end));
        if from > to {
            return Err(DeriveError::InvalidWindow {
                year: self.year,
                from,
                to,
            });
        }
        Ok((from, to))
    }

    pub fn params(&self) -> DeriveParams {
        DeriveParams {
            output_format: self.output_format,
            fill_gaps: self.fill_gaps,
            rth_only: self.rth_only,
        }
    }
}

/// File and row accounting for one tick stream
#[derive(Debug, Default, Clone, Copy)]
struct StreamSummary {
    files_used: usize,
    files_skipped: usize,
    rows: RowStats,
}

/// Runs the tick → bar pipeline and maintains manifests
#[derive(Debug, Clone)]
pub struct Deriver {
    layout: DataLayout,
    reader: TickReader,
    labeler: SessionLabeler,
    calendar_version: String,
    hash_inputs: bool,
}

impl Deriver {
    /// Build a deriver from configuration
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let tz = config.derive.tz()?;
        Ok(Self {
            layout: DataLayout::new(&config.data.base_dir),
            reader: TickReader::new(TickReaderOptions {
                fixed_point_prices: config.ticks.fixed_point_prices,
            }),
            labeler: SessionLabeler::new(tz),
            calendar_version: config.derive.calendar_version.clone(),
            hash_inputs: config.derive.hash_inputs,
        })
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Derive bars for `request`, or return the stored manifest when the same
    /// derivation already happened and `force` is not set
    pub fn derive(&self, request: &DeriveRequest) -> Result<DerivationManifest, DeriveError> {
        let _span = tracing::info_span!(
            "derive",
            symbol = %request.symbol,
            year = request.year,
            timeframe = %request.timeframe
        )
        .entered();

        let started = Instant::now();
        let result = self.run(request);
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        telemetry::record_derive_duration(request.timeframe.label(), outcome, started.elapsed());
        result
    }

    fn run(&self, request: &DeriveRequest) -> Result<DerivationManifest, DeriveError> {
        let (from, to) = request.window()?;
        let params = request.params();
        let symbol = request.symbol.as_str();
        let bars_path = self.layout.bars_path(
            symbol,
            request.year,
            request.timeframe,
            request.output_format,
        );
        let manifest_path = self
            .layout
            .manifest_path(symbol, request.year, request.timeframe);

        if !request.force {
            let reusable = self.reusable_manifest(&manifest_path, &bars_path, request, from, to);
            if let Some(existing) = reusable {
                tracing::info!(path = ?manifest_path, "Manifest up to date, skipping derivation");
                return Ok(existing);
            }
        }

        // Resolve inputs.
        let symbology_path = self
            .layout
            .symbology_path()
            .ok_or_else(|| DeriveError::SymbologyMissing {
                symbol: symbol.to_string(),
            })?;
        let instrument_id = self.resolve_instrument(&symbology_path, symbol, from, to)?;

        let trades_dir = self.layout.stream_dir(StreamKind::Trades);
        let trade_files = discover_tick_files(&trades_dir, StreamKind::Trades, from, to)?;
        if trade_files.is_empty() {
            return Err(DeriveError::NoInputData {
                symbol: symbol.to_string(),
                from,
                to,
            });
        }
        let tbbo_dir = self.layout.stream_dir(StreamKind::Tbbo);
        let quote_files = discover_tick_files(&tbbo_dir, StreamKind::Tbbo, from, to)?;

        tracing::info!(
            instrument_id,
            %from,
            %to,
            trade_files = trade_files.len(),
            quote_files = quote_files.len(),
            "Starting derivation"
        );

        // Aggregate and reconcile.
        let mut reconciler = Reconciler::new();
        let trades = self.consolidate(
            StreamKind::Trades,
            &trade_files,
            |file| aggregate_trade_file(&self.reader, file, instrument_id),
            |table: MinuteTable<_>| reconciler.add_trades(table),
        );
        if trades.files_used == 0 {
            return Err(DeriveError::NoInputData {
                symbol: symbol.to_string(),
                from,
                to,
            });
        }
        let quotes = self.consolidate(
            StreamKind::Tbbo,
            &quote_files,
            |file| aggregate_quote_file(&self.reader, file, instrument_id),
            |table: MinuteTable<_>| reconciler.add_quotes(table),
        );

        let (mut minutes, reconcile_stats) = reconciler.reconcile();
        tracing::debug!(
            from_trades = reconcile_stats.from_trades,
            from_quotes = reconcile_stats.from_quotes,
            dropped = reconcile_stats.dropped,
            "Reconciled minute series"
        );

        if request.fill_gaps {
            minutes = fill_gaps(minutes, from, to);
        }

        let mut labeled = self.labeler.label_all(symbol, minutes);
        if request.rth_only {
            labeled.retain(|bar| bar.is_rth);
        }

        let bars = resample(&labeled, request.timeframe, self.labeler.tz());
        if bars.is_empty() {
            return Err(DeriveError::EmptySeries {
                symbol: symbol.to_string(),
            });
        }
        check_consistency(&bars, request.timeframe);

        // Persist bars, then the manifest that vouches for them.
        let size = write_bars(&bars_path, request.output_format, &bars).map_err(|source| {
            DeriveError::OutputWriteFailure {
                path: bars_path.clone(),
                source,
            }
        })?;
        telemetry::increment(CounterMetric::BarsWritten, request.timeframe.label(), bars.len() as u64);

        let input_hashes = self.input_hashes(&symbology_path, &trade_files, &quote_files)?;
        let output_hashes = BTreeMap::from([(
            DataLayout::bars_file_name(request.timeframe, request.output_format),
            sha256_file(&bars_path)?,
        )]);

        let manifest = DerivationManifest {
            dataset_id: DataLayout::dataset_id(symbol, request.year, request.timeframe),
            symbol: symbol.to_string(),
            interval: request.timeframe,
            from_date: from,
            to_date: to,
            params,
            input_hashes,
            output_hashes,
            calendar_version: self.calendar_version.clone(),
            tz: self.labeler.tz().name().to_string(),
            created_at: Utc::now(),
        };
        manifest
            .store(&manifest_path)
            .map_err(DeriveError::ManifestWriteFailure)?;

        tracing::info!(
            bars = bars.len(),
            size_bytes = size,
            ticks = trades.rows.accepted + quotes.rows.accepted,
            rows_skipped = trades.rows.skipped + quotes.rows.skipped,
            files_skipped = trades.files_skipped + quotes.files_skipped,
            path = ?bars_path,
            "Derived bars"
        );

        Ok(manifest)
    }

    /// The stored manifest, if it describes this exact request and its bar
    /// file is still on disk
    fn reusable_manifest(
        &self,
        manifest_path: &Path,
        bars_path: &Path,
        request: &DeriveRequest,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Option<DerivationManifest> {
        let existing = match DerivationManifest::load(manifest_path) {
            Ok(Some(manifest)) => manifest,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable manifest");
                return None;
            }
        };

        let params = request.params();
        if !existing.describes(&request.symbol, request.timeframe, from, to, &params) {
            tracing::info!(path = ?manifest_path, "Manifest describes a different request, re-deriving");
            return None;
        }
        if !bars_path.is_file() {
            tracing::warn!(path = ?bars_path, "Bar file missing, re-deriving");
            return None;
        }
        Some(existing)
    }

    fn resolve_instrument(
        &self,
        symbology_path: &Path,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<InstrumentId, DeriveError> {
        let missing = || DeriveError::SymbologyMissing {
            symbol: symbol.to_string(),
        };
        let symbology = Symbology::load(symbology_path).map_err(|e| {
            tracing::warn!(path = ?symbology_path, error = %e, "Failed to load symbology");
            missing()
        })?;
        symbology.resolve(symbol, from, to).ok_or_else(missing)
    }

    /// Aggregate every file of one stream and hand each usable table to `merge`
    ///
    /// A malformed file contributes nothing; its partial rows are discarded.
    fn consolidate<P, A, M>(
        &self,
        kind: StreamKind,
        files: &[TickFile],
        mut aggregate: A,
        mut merge: M,
    ) -> StreamSummary
    where
        A: FnMut(&TickFile) -> Result<(MinuteTable<P>, RowStats), TickError>,
        M: FnMut(MinuteTable<P>),
    {
        let mut summary = StreamSummary::default();
        let mut progress = Progress::new(kind.as_str(), files.len());

        for file in files {
            match aggregate(file) {
                Ok((table, stats)) => {
                    if stats.skipped > 0 {
                        tracing::debug!(file = %file.file_name(), skipped = stats.skipped, "Dropped malformed rows");
                    }
                    telemetry::increment(CounterMetric::TicksRead, kind.as_str(), stats.accepted);
                    telemetry::increment(CounterMetric::RowsSkipped, kind.as_str(), stats.skipped);
                    summary.rows.merge(stats);
                    summary.files_used += 1;
                    merge(table);
                    progress.advance(&file.file_name(), stats.total());
                }
                Err(e) => {
                    tracing::warn!(file = %file.file_name(), error = %e, "Skipping malformed tick file");
                    telemetry::increment(CounterMetric::FilesSkipped, kind.as_str(), 1);
                    summary.files_skipped += 1;
                    progress.advance(&file.file_name(), 0);
                }
            }
        }

        summary
    }

    fn input_hashes(
        &self,
        symbology_path: &Path,
        trade_files: &[TickFile],
        quote_files: &[TickFile],
    ) -> io::Result<BTreeMap<String, String>> {
        let mut hashes = BTreeMap::new();
        hashes.insert(SYMBOLOGY_FILE.to_string(), sha256_file(symbology_path)?);

        if self.hash_inputs {
            for file in trade_files.iter().chain(quote_files) {
                hashes.insert(
                    format!("{}/{}", file.kind, file.file_name()),
                    sha256_file(&file.path)?,
                );
            }
        } else {
            hashes.insert(
                StreamKind::Trades.as_str().to_string(),
                count_surrogate(trade_files.len()),
            );
            hashes.insert(
                StreamKind::Tbbo.as_str().to_string(),
                count_surrogate(quote_files.len()),
            );
        }

        Ok(hashes)
    }
}

/// Count bars violating OHLC ordering; any hit is an aggregation bug
fn check_consistency(bars: &[CanonicalBar], timeframe: Timeframe) -> usize {
    let inconsistent = bars.iter().filter(|bar| !bar.is_consistent()).count();
    if inconsistent > 0 {
        telemetry::increment(CounterMetric::InconsistentBars, timeframe.label(), inconsistent as u64);
        tracing::error!(inconsistent, %timeframe, "Bars violate OHLC ordering");
    }
    debug_assert!(inconsistent == 0, "{inconsistent} bars violate OHLC ordering");
    inconsistent
}
