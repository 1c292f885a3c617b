//! Binary entry point. The real RPC client to a remote table service is an
//! external collaborator this workspace does not implement; this binary
//! wires the dispatch contract to [`ebq_cli::InMemoryTableService`] so the
//! CLI surface is exercisable end to end without one.

use ebq_cli::InMemoryTableService;

fn main() {
    let mut service = InMemoryTableService::default();
    std::process::exit(ebq_cli::run_with_args(std::env::args_os(), &mut service));
}
