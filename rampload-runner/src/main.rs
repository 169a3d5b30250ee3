//! Command line entry point of the rampload load generator.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

fn main() -> anyhow::Result<()> {
    rampload::cli::execute()
}
