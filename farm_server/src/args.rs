//! Argument parsing and validation
//! Uses library `clap`

use std::ffi::OsStr;

use clap::{Arg, Command, ValueHint};

/// Same as `renderfarm::DEFAULT_PORT`
pub const DEFAULT_PORT_ARG: &str = "18018";

pub fn is_port(num: &str) -> Result<(), String> {
    match num.parse::<u16>() {
        Ok(_) => Ok(()),
        Err(_) => Err("Port must be a number in range <0;65535>".into()),
    }
}

// up to 32bit value
pub fn is_positive_number(num: &str) -> Result<(), String> {
    let n = num.parse::<u32>();
    match n {
        Ok(n) => {
            if n > 0 {
                Ok(())
            } else {
                Err("Number must be greater than 0".into())
            }
        }
        Err(_) => Err("Number required".into()),
    }
}

pub fn get_command<'a>() -> Command<'a> {
    Command::new("farm_server")
        .version("0.2.0")
        .about("Render worker, renders scenes pushed by a master over TCP")
        .arg(
            Arg::new("server")
                .help("Run as render worker")
                .long("server"),
        )
        .arg(
            Arg::new("serverport")
                .help("Port to listen on")
                .long("serverport")
                .short('p')
                .takes_value(true)
                .value_name("PORT")
                .default_value(DEFAULT_PORT_ARG)
                .validator(is_port),
        )
        .arg(
            Arg::new("threads")
                .help("Render threads, defaults to available parallelism")
                .long("threads")
                .short('t')
                .takes_value(true)
                .value_name("N")
                .validator(is_positive_number),
        )
        .arg(
            Arg::new("serverwriteflm")
                .help("Write film to a resume file before sending it")
                .long("serverwriteflm"),
        )
        .arg(
            Arg::new("workdir")
                .help("Directory for received files and resume files")
                .long("workdir")
                .short('w')
                .takes_value(true)
                .value_name("DIR")
                .allow_invalid_utf8(true)
                .value_hint(ValueHint::DirPath)
                .default_value_os(OsStr::new(".")),
        )
        .arg(
            Arg::new("verbose")
                .help("Log debug messages")
                .long("verbose")
                .short('v'),
        )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_port_matches_library() {
        assert_eq!(
            DEFAULT_PORT_ARG.parse::<u16>().unwrap(),
            renderfarm::DEFAULT_PORT
        );
    }

    #[test]
    fn validators() {
        assert!(is_port("0").is_ok());
        assert!(is_port("65536").is_err());
        assert!(is_positive_number("0").is_err());
        assert!(is_positive_number("four").is_err());
        assert!(is_positive_number("4").is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        let res = get_command().try_get_matches_from(["farm_server", "--threads", "0"]);
        assert!(res.is_err());
        let res = get_command().try_get_matches_from(["farm_server", "--serverport", "http"]);
        assert!(res.is_err());
    }
}
