mod oracle;
mod preparer;

pub use oracle::{extract_json_array, parse_score_items, score_unscored};
pub use preparer::prepare_batch;
