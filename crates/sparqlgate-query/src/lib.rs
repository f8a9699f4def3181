pub mod compress;
pub mod executor;
pub mod fanout;
pub mod reconcile;
pub mod truncate;

pub use compress::{compress, RECORD_LIST_MAX_ROWS};
pub use executor::{HttpQueryExecutor, QueryExecutor, QueryTarget, SPARQL_RESULTS_JSON};
pub use fanout::fan_out;
pub use reconcile::{
    AuxiliarySource, CountSource, KeyedSource, ReconcileRequest, ReconciledPage, Reconciler,
};
pub use truncate::{truncate, OutputTruncator, Truncated, DEFAULT_MAX_OUTPUT_CHARS};
