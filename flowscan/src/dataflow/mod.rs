//! Intra-procedural data flow: def-use chains and forward taint analysis.

mod defuse;
mod taint;

pub use defuse::{DefUse, DefUseChain};
pub use taint::{analyze_taint, name_matches, NameLists, TaintDetection, TaintInfo, TaintSummary};
