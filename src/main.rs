use std::path::{Path, PathBuf};
use std::process::exit;

use bootimg::compress::{compress_file, decompress_file};
use bootimg::{
    repack, split_image_dtb, unpack, Block, BootImage, Format, HeaderTrait, RepackOptions,
    UnpackOptions, UnpackStatus,
};
use clap::{crate_authors, crate_version, Arg, ArgAction, ArgMatches, Command};
use console::ConsoleOutputHandler;
use termcolor::ColorChoice;

const ARG_DUMP_HEADER_LONG_HELP: &str = "
Also write the editable header fields to 'DIR/header' as key=value lines.

The file is read back by 'repack', so page size, name, command line and OS version can be changed there.
";

/// Exit code of `unpack` for ChromeOS images, which need external signing.
const EXIT_NEEDS_SIGNING: i32 = 2;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let console = ConsoleOutputHandler::new(ColorChoice::Auto);

    match create_app().get_matches().subcommand() {
        Some(("unpack", arguments)) => main_unpack(arguments, console),
        Some(("repack", arguments)) => main_repack(arguments, console),
        Some(("info", arguments)) => main_info(arguments, console),
        Some(("split", arguments)) => main_split(arguments, console),
        Some(("compress", arguments)) => main_compress(arguments, console),
        Some(("decompress", arguments)) => main_decompress(arguments, console),
        _ => unreachable!(),
    }
}

fn create_app() -> Command {
    Command::new("bootimg")
        .subcommand_required(true)
        .version(crate_version!())
        .author(crate_authors!())
        .about("Program for unpacking and repacking Android boot images.")
        .subcommand(create_app_unpack())
        .subcommand(create_app_repack())
        .subcommand(create_app_info())
        .subcommand(create_app_split())
        .subcommand(create_app_compress())
        .subcommand(create_app_decompress())
}

fn input_arg() -> Arg {
    Arg::new("input_file")
        .required(true)
        .help("The boot image, for example 'boot.img'")
        .value_name("INPUT_FILE")
        .value_parser(clap::value_parser!(PathBuf))
}

fn directory_arg() -> Arg {
    Arg::new("directory")
        .short('C')
        .long("directory")
        .help("Directory holding the unpacked artifacts")
        .value_name("DIR")
        .default_value(".")
        .value_parser(clap::value_parser!(PathBuf))
}

fn create_app_unpack() -> Command {
    Command::new("unpack")
        .about("Unpacks a boot image into per-block files.")
        .arg(input_arg())
        .arg(directory_arg())
        .arg(
            Arg::new("no_decompress")
                .short('n')
                .long("no-decompress")
                .action(ArgAction::SetTrue)
                .help("Write kernel, ramdisk and extra exactly as stored"),
        )
        .arg(
            Arg::new("dump_header")
                .short('H')
                .long("dump-header")
                .action(ArgAction::SetTrue)
                .help("Also write the header fields to 'DIR/header'")
                .long_help(ARG_DUMP_HEADER_LONG_HELP),
        )
}

fn create_app_repack() -> Command {
    Command::new("repack")
        .about("Rebuilds a boot image, using the original as a template.")
        .arg(input_arg())
        .arg(
            Arg::new("output_file")
                .help("Where to write the new image")
                .value_name("OUTPUT_FILE")
                .default_value("new-boot.img")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(directory_arg())
        .arg(
            Arg::new("no_compress")
                .short('n')
                .long("no-compress")
                .action(ArgAction::SetTrue)
                .help("Store the artifacts without recompressing them"),
        )
}

fn create_app_info() -> Command {
    Command::new("info")
        .about("Prints the header and lists the blocks in a boot image.")
        .arg(input_arg())
}

fn create_app_split() -> Command {
    Command::new("split")
        .about("Splits a kernel image from its appended device tree.")
        .arg(
            Arg::new("input_file")
                .required(true)
                .help("The kernel image, for example 'zImage-dtb'")
                .value_name("INPUT_FILE")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(directory_arg())
        .arg(
            Arg::new("no_decompress")
                .short('n')
                .long("no-decompress")
                .action(ArgAction::SetTrue)
                .help("Write the kernel part exactly as stored"),
        )
}

fn file_args(input_help: &'static str) -> [Arg; 2] {
    [
        Arg::new("input_file")
            .required(true)
            .help(input_help)
            .value_name("INPUT_FILE")
            .value_parser(clap::value_parser!(PathBuf)),
        Arg::new("output_file")
            .help("Where to write the result, derived from INPUT_FILE if omitted")
            .value_name("OUTPUT_FILE")
            .value_parser(clap::value_parser!(PathBuf)),
    ]
}

fn parse_format(name: &str) -> Result<Format, String> {
    Format::from_name(name)
        .filter(|format| format.is_compressed())
        .ok_or_else(|| format!("'{name}' is not a format with an encoder"))
}

fn create_app_compress() -> Command {
    Command::new("compress")
        .about("Compresses a file, for example an edited ramdisk.")
        .args(file_args("The file to compress"))
        .arg(
            Arg::new("format")
                .short('F')
                .long("format")
                .help("Compression format, for example 'gzip', 'xz' or 'lz4_legacy'")
                .value_name("FORMAT")
                .default_value("gzip")
                .value_parser(parse_format),
        )
}

fn create_app_decompress() -> Command {
    Command::new("decompress")
        .about("Decompresses a file, detecting its format.")
        .args(file_args("The compressed file"))
}

fn path_arg<'a>(arguments: &'a ArgMatches, name: &str) -> &'a Path {
    arguments
        .get_one::<PathBuf>(name)
        .map(PathBuf::as_path)
        .unwrap_or_else(|| unreachable!("'{name}' is required or defaulted"))
}

fn main_unpack(arguments: &ArgMatches, mut console: ConsoleOutputHandler) {
    let input_path = path_arg(arguments, "input_file");
    let directory = path_arg(arguments, "directory");
    let options = UnpackOptions {
        skip_decompress: arguments.get_flag("no_decompress"),
        dump_header: arguments.get_flag("dump_header"),
    };

    match unpack(input_path, directory, &options) {
        Ok(UnpackStatus::Done) => console.print_status_success(
            "Unpacked",
            &format!("'{}' into '{}'.", input_path.display(), directory.display()),
        ),
        Ok(UnpackStatus::NeedsSigning) => {
            console.print_warning_message(&format!(
                "'{}' is a ChromeOS image, the repacked image has to be signed.",
                input_path.display()
            ));
            exit(EXIT_NEEDS_SIGNING);
        }
        Err(error) => console.print_fatal_error(
            &format!("Failed to unpack boot image '{}'", input_path.display()),
            Some(&error),
        ),
    }
}

fn main_repack(arguments: &ArgMatches, mut console: ConsoleOutputHandler) {
    let input_path = path_arg(arguments, "input_file");
    let output_path = path_arg(arguments, "output_file");
    let directory = path_arg(arguments, "directory");
    let options = RepackOptions {
        skip_compress: arguments.get_flag("no_compress"),
    };

    match repack(input_path, output_path, directory, &options) {
        Ok(()) => console.print_status_success(
            "Repacked",
            &format!("'{}' into '{}'.", input_path.display(), output_path.display()),
        ),
        Err(error) => console.print_fatal_error(
            &format!("Failed to repack boot image '{}'", input_path.display()),
            Some(&error),
        ),
    }
}

fn main_info(arguments: &ArgMatches, mut console: ConsoleOutputHandler) {
    use humansize::{format_size, BINARY};

    let input_path = path_arg(arguments, "input_file");
    let image = match BootImage::open(input_path) {
        Ok(image) => image,
        Err(error) => console.print_fatal_error(
            &format!("Failed to parse boot image '{}'", input_path.display()),
            Some(&error),
        ),
    };

    let layout = image.layout();
    console.print_status_success(
        "Parsed",
        &format!("{} ({}).", layout.container(), image.header().name()),
    );
    console.print_message(image.header().to_string().trim_end());
    if !layout.flags().is_empty() {
        console.print_message(&format!("{:<15} [{:?}]", "FLAGS", layout.flags()));
    }

    let header_range = layout.header_range();
    console.print_message(&format!(
        "0x{:08X} - {: <14} (size: {})",
        header_range.start,
        "header",
        format_size(image.header().header_size(), BINARY)
    ));
    for block in Block::ALL {
        let range = layout.range(block);
        if range.is_empty() {
            continue;
        }
        console.print_message(&format!(
            "0x{:08X} - {: <14} (size: {}, format: {})",
            range.start,
            block,
            format_size(range.len(), BINARY),
            layout.format(block)
        ));
    }
}

fn main_split(arguments: &ArgMatches, mut console: ConsoleOutputHandler) {
    let input_path = path_arg(arguments, "input_file");
    let directory = path_arg(arguments, "directory");

    match split_image_dtb(input_path, directory, arguments.get_flag("no_decompress")) {
        Ok(true) => console.print_status_success(
            "Split",
            &format!("'{}' into '{}'.", input_path.display(), directory.display()),
        ),
        Ok(false) => {
            console.print_error_as_error(
                &format!("No device tree found in '{}'.", input_path.display()),
                None,
            );
            exit(1);
        }
        Err(error) => console.print_fatal_error(
            &format!("Failed to split kernel image '{}'", input_path.display()),
            Some(&error),
        ),
    }
}

fn main_compress(arguments: &ArgMatches, mut console: ConsoleOutputHandler) {
    let input_path = path_arg(arguments, "input_file");
    let output_path = arguments.get_one::<PathBuf>("output_file").map(PathBuf::as_path);
    let format = arguments
        .get_one::<Format>("format")
        .copied()
        .unwrap_or(Format::Gzip);

    match compress_file(format, input_path, output_path) {
        Ok(output_path) => console.print_status_success(
            "Compressed",
            &format!("'{}' into '{}'.", input_path.display(), output_path.display()),
        ),
        Err(error) => console.print_fatal_error(
            &format!("Failed to compress '{}'", input_path.display()),
            Some(&error),
        ),
    }
}

fn main_decompress(arguments: &ArgMatches, mut console: ConsoleOutputHandler) {
    let input_path = path_arg(arguments, "input_file");
    let output_path = arguments.get_one::<PathBuf>("output_file").map(PathBuf::as_path);

    match decompress_file(input_path, output_path) {
        Ok((format, output_path)) => console.print_status_success(
            "Decompressed",
            &format!(
                "{} data in '{}' into '{}'.",
                format,
                input_path.display(),
                output_path.display()
            ),
        ),
        Err(error) => console.print_fatal_error(
            &format!("Failed to decompress '{}'", input_path.display()),
            Some(&error),
        ),
    }
}

mod console {
    use std::error::Error;
    use std::io::Write;
    use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

    /// An interface for the application to the console output. Handles things
    /// like formatting. Status lines go to stdout, errors and warnings to
    /// stderr.
    ///
    /// If this structure ever fails writing, the error will be silently
    /// ignored.
    pub struct ConsoleOutputHandler<O = StandardStream, E = StandardStream> {
        stream: O,
        error_stream: E,
    }

    impl ConsoleOutputHandler {
        pub fn new(color: ColorChoice) -> Self {
            ConsoleOutputHandler {
                stream: StandardStream::stdout(color),
                error_stream: StandardStream::stderr(color),
            }
        }
    }

    impl<O: WriteColor, E: WriteColor> ConsoleOutputHandler<O, E> {
        #[cfg(test)]
        pub fn with_streams(stream: O, error_stream: E) -> Self {
            ConsoleOutputHandler {
                stream,
                error_stream,
            }
        }

        #[cfg(test)]
        pub fn into_streams(self) -> (O, E) {
            (self.stream, self.error_stream)
        }

        fn write_line<W: WriteColor>(stream: &mut W, message: &str) {
            let _ = stream.set_color(&ColorSpec::new());
            let _ = writeln!(stream, "{}", message);
        }

        pub fn print_message(&mut self, message: &str) {
            Self::write_line(&mut self.stream, message);
        }

        pub fn print_error_message(&mut self, message: &str) {
            let _ = self
                .error_stream
                .set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));

            let _ = write!(self.error_stream, "error: ");
            Self::write_line(&mut self.error_stream, message);
        }

        pub fn print_warning_message(&mut self, message: &str) {
            let _ = self
                .error_stream
                .set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));

            let _ = write!(self.error_stream, "warning: ");
            Self::write_line(&mut self.error_stream, message);
        }

        fn print_status(&mut self, colour: &ColorSpec, status: &str, message: &str) {
            let _ = self.stream.set_color(colour);
            let _ = write!(self.stream, "{: >12}", status);
            let _ = self.stream.set_color(&ColorSpec::new());
            let _ = writeln!(self.stream, " {}", message);
        }

        pub fn print_status_success(&mut self, status: &str, message: &str) {
            self.print_status(
                ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true),
                status,
                message,
            );
        }

        fn print_error_cause(&mut self, mut error_opt: Option<&dyn Error>, colour: Color) {
            let mut colour_spec = ColorSpec::new();
            colour_spec.set_fg(Some(colour));

            while let Some(error) = error_opt {
                let _ = self.error_stream.set_color(&colour_spec);
                let _ = write!(self.error_stream, "caused by: ");
                Self::write_line(&mut self.error_stream, &error.to_string());
                error_opt = error.source();
            }
        }

        pub fn print_error_as_error(&mut self, message: &str, error_opt: Option<&dyn Error>) {
            self.print_error_message(message);
            self.print_error_cause(error_opt, Color::Red);
        }

        pub fn print_fatal_error(&mut self, message: &str, error_opt: Option<&dyn Error>) -> ! {
            use std::process::exit;
            self.print_error_as_error(message, error_opt);
            exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::console::ConsoleOutputHandler;
    use super::*;
    use std::io;
    use termcolor::Buffer;

    fn captured(run: impl FnOnce(&mut ConsoleOutputHandler<Buffer, Buffer>)) -> (String, String) {
        let mut console = ConsoleOutputHandler::with_streams(Buffer::no_color(), Buffer::no_color());
        run(&mut console);
        let (out, err) = console.into_streams();
        (
            String::from_utf8(out.into_inner()).unwrap(),
            String::from_utf8(err.into_inner()).unwrap(),
        )
    }

    #[test]
    fn diagnostics_go_to_the_error_stream() {
        let (out, err) = captured(|console| {
            console.print_status_success("Unpacked", "'boot.img' into '.'.");
            let cause = io::Error::new(io::ErrorKind::NotFound, "no such file");
            console.print_error_as_error("Failed to unpack boot image 'boot.img'", Some(&cause));
            console.print_warning_message("'boot.img' is a ChromeOS image.");
        });

        assert_eq!(out, "    Unpacked 'boot.img' into '.'.\n");
        assert_eq!(
            err,
            "error: Failed to unpack boot image 'boot.img'\n\
             caused by: no such file\n\
             warning: 'boot.img' is a ChromeOS image.\n"
        );
    }

    #[test]
    fn format_names_are_checked_for_an_encoder() {
        assert_eq!(parse_format("lz4_lg"), Ok(Format::Lz4Lg));
        assert!(parse_format("lzop").is_err());
        assert!(parse_format("bogus").is_err());
        create_app().debug_assert();
    }
}
