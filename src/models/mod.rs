// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{BulkNotifyReport, Decision, Match, MatchStatus, Member, MemberStatus, NewMatch, Notification, NotificationKind, ResponseState, Side};
pub use requests::{BreakUpRequest, CreateMatchRequest, MemberMatchesQuery, RespondRequest};
pub use responses::{ErrorResponse, HealthResponse, MatchListResponse};
