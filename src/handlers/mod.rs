// handlers/mod.rs - Handlers grouped by the gates in front of them
//
// public    → no credential required (/v1/health, /v1/register, /v1/login)
// protected → verified `jwt` cookie (/v1/status, /v1/logout)
// elevated  → credential plus administrator or supreme leader gates
//             (/v1/admin/*, /v1/supreme-leader/*)
pub mod elevated;
pub mod protected;
pub mod public;
