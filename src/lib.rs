// Library root
// -----------
// This crate exposes the pieces of an interactive OneDrive client. The
// binary (`main.rs`) wires them together and starts the menu loop.
//
// Module responsibilities:
// - `api`: the `DriveClient` seam and its Microsoft Graph implementation.
// - `model`: remote item snapshots and their kind.
// - `path_state`: current remote folder plus its cached listing.
// - `menu`: navigation choices for a path state and label resolution.
// - `transfer`: single file download (with metadata sidecar) and upload.
// - `mirror`: recursive, path-based download of a whole remote folder.
// - `session`: the replaceable authenticated client handle.
// - `config`, `logging`, `error`: settings, log sink, error taxonomy.
// - `ui`: prompts and the interactive loop.
//
// Everything below `ui` is free of terminal I/O, so the loop can be driven
// in tests with a fake drive and scripted answers.
pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod menu;
pub mod mirror;
pub mod model;
pub mod path_state;
pub mod session;
pub mod transfer;
pub mod ui;
