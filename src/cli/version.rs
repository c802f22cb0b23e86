/// Display version information
pub fn execute() {
    println!("snov {}", env!("CARGO_PKG_VERSION"));
    println!("Sentry node owner verification daemon");
}
