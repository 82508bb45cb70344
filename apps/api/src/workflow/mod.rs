// Workflow sessions: upload → describe → analyze → result.
// State transitions live in session.rs; handlers only orchestrate the two
// suspension points (file read, analysis call) around them.

pub mod handlers;
pub mod session;
pub mod store;
