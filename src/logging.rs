use std::io::Write;

use log::LevelFilter;

/// Set up stderr logging once at startup.
///
/// `info` by default, `debug` with `--debug`. `RUST_LOG` wins over both.
pub fn init(debug: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {} {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .parse_default_env();

    // A second call (tests, embedding) keeps the first logger
    let _ = builder.try_init();
}
