mod foryou;
mod ranker;

pub use foryou::{assemble_page, decode_cursor, encode_cursor, ForYouPage, RankedArticle};
pub use ranker::{compute_rank, max_topic_weight};
