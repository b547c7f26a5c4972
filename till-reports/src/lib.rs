//! Period summaries and the home dashboard, computed from ledger entries.

mod buckets;
mod dashboard;
mod error;
mod period;
mod summary;

pub use buckets::{bucket_starts, chart, chart_window, ChartPoint, Granularity};
pub use dashboard::{
    summarize_dashboard, summarize_dashboard_at, DashboardMetrics, DashboardRequest,
    DashboardSnapshot, Direction, MetricChange,
};
pub use error::{ReportError, ReportResult};
pub use period::{DateWindow, Period};
pub use summary::{summarize, PeriodSummary};
