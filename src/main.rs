use simdeck::{
    app::App,
    cli::{Command, DEFAULT_SNAPSHOT_WINDOW},
    Result,
};

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match Command::parse(&args) {
        Ok(Command::ShowHelp) => {
            Command::print_help();
            Ok(())
        }
        Ok(Command::ShowVersion) => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Ok(Command::Run(opts)) => {
            let app = App::from_options(opts)?;
            app.run()
        }
        Ok(Command::Snapshot(opts)) => {
            let window = opts.snapshot_window.unwrap_or(DEFAULT_SNAPSHOT_WINDOW);
            let app = App::from_options(opts)?;
            app.snapshot(window)
        }
        Err(err) => {
            Command::print_help();
            Err(err)
        }
    }
}
