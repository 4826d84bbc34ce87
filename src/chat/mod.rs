//! Chat front end.
//!
//! A single-page UI served by axum. Each user message is forwarded, together
//! with the windowed history the browser echoes back, to the external agent
//! through an [`AgentSession`]; the reply is relayed as Server-Sent Events.
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `GET /` | the page |
//! | `GET /api/models` | selectable model ids |
//! | `POST /api/chat` | one turn, streamed as `delta`, then `done` or `error` events |
//! | `POST /api/report` | render text as a downloadable report |
//! | `GET /health` | liveness |

mod agent;
mod conversation;
mod report;
mod server;

pub use agent::{
    parse_sse_chunk, parse_sse_line, AgentError, AgentSession, ChatMessage, DeltaStream,
    HttpAgentSession, Role, SseLine,
};
pub use conversation::Conversation;
pub use report::{render as render_report, Report, ReportError};
pub use server::{router, serve, AppState, ChatRequest, ReportRequest};
