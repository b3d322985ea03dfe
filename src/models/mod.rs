mod article;
mod feed;
mod interests;
mod score;

pub use article::{Article, ArticleQuery, NewArticle};
pub use feed::{Feed, NewFeed};
pub use interests::{InterestProfile, InterestTopic, RescoreState};
pub use score::{FeedbackAction, Score, ScoreItem, ScoredArticle};
