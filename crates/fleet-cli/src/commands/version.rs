//! Version command

use crate::output::OutputContext;

/// Print the tool name and version
pub fn version(ctx: &OutputContext) {
    if ctx.quiet {
        println!("{}", env!("CARGO_PKG_VERSION"));
    } else {
        println!("Fleet CLI");
        println!("V {}", env!("CARGO_PKG_VERSION"));
    }
}
