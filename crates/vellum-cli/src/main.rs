use anyhow::Result;
use vellum_cli::App;

fn main() -> Result<()> {
    // The stock binary carries no adapter; only `vellum routes` works here
    vellum_cli::run(App::new())
}
