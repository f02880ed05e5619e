mod common;

use std::{
    error::Error,
    io::{self, ErrorKind},
};

use common::MockSink;
use csv_engine::{
    CsvError, CsvOptions, Position, open_reader, parse, parse_bytes, read_all_from,
    stream::{csv_reader::CsvReaderBuilder, csv_writer::CsvWriterBuilder},
};

fn malformed(result: Result<csv_engine::Table, CsvError>) -> (String, Position) {
    match result {
        Err(CsvError::MalformedCsv { message, position }) => (message, position),
        Err(other) => panic!("expected a syntax error, got {}", other),
        Ok(table) => panic!("expected a syntax error, got {} rows", table.len()),
    }
}

#[test]
fn unclosed_quote_should_report_the_row_start() {
    let (message, position) = malformed(parse("a,b\nc,\"d\ne\n", &CsvOptions::new()));

    assert_eq!(message, "Unclosed quoted field");
    assert_eq!(position.line, 2);
}

#[test]
fn content_after_closing_quote_should_fail() {
    let error = parse("x\n\"a\"b,c\n", &CsvOptions::new()).unwrap_err();

    assert_eq!(error.to_string(), "Any value after quoted field isn't allowed in line 2.");
    assert_eq!(error.line(), Some(2));
}

#[test]
fn liberal_parsing_should_keep_stray_quotes() -> Result<(), Box<dyn Error>> {
    let options = CsvOptions::new().liberal_parsing(true);
    let table = parse("\"a\"b,c\nd\"e,f\n", &options)?;

    assert_eq!(table[0], vec!["\"a\"b", "c"]);
    assert_eq!(table[1], vec!["d\"e", "f"]);
    Ok(())
}

#[test]
fn quote_inside_unquoted_field_should_fail() {
    let (message, position) = malformed(parse("ok\nbad\"field\n", &CsvOptions::new()));

    assert_eq!(message, "Illegal quoting");
    assert_eq!(position.line, 2);
}

#[test]
fn stray_line_break_should_fail() {
    let (message, _) = malformed(parse("a,b\r\nc\rd\r\n", &CsvOptions::new().row_sep("\r\n")));
    assert!(message.starts_with("Unquoted fields do not allow new line"));
}

#[test]
fn rows_before_a_syntax_error_should_be_delivered() -> Result<(), Box<dyn Error>> {
    let mut reader = CsvReaderBuilder::new().from_reader("1\n2\n\"3\n".as_bytes())?;

    assert!(reader.shift()?.is_some());
    assert!(reader.shift()?.is_some());
    assert!(matches!(reader.shift(), Err(CsvError::MalformedCsv { .. })));
    assert!(reader.shift()?.is_none());
    Ok(())
}

#[test]
fn invalid_bytes_should_name_line_and_encoding() {
    let error = parse_bytes(b"a\nb\nc\xC3(\n", &CsvOptions::new().encoding("utf-8")).unwrap_err();

    assert!(matches!(
        &error,
        CsvError::MalformedEncoding { encoding, position } if encoding == "UTF-8" && position.line == 3
    ));
    assert_eq!(error.to_string(), "invalid byte sequence in UTF-8 in line 3.");
}

#[test]
fn invalid_options_should_be_rejected_and_left_intact() {
    let options = CsvOptions::new().col_sep("");
    let snapshot = options.clone();

    assert!(matches!(
        read_all_from("a".as_bytes(), &options),
        Err(CsvError::InvalidInput(_))
    ));
    assert!(matches!(
        CsvWriterBuilder::new().options(&options).from_writer(Vec::new()),
        Err(CsvError::InvalidInput(_))
    ));
    assert_eq!(options, snapshot);

    let clash = CsvOptions::new().col_sep("|").row_sep("|");
    assert!(matches!(parse("a", &clash), Err(CsvError::InvalidInput(_))));

    let quoted = CsvOptions::new().col_sep("\"");
    assert!(matches!(parse("a", &quoted), Err(CsvError::InvalidInput(_))));
}

#[test]
fn missing_file_should_be_an_io_error() {
    match open_reader("/nonexistent/dir/data.csv", &CsvOptions::new()) {
        Err(CsvError::Io(error)) => assert_eq!(error.kind(), ErrorKind::NotFound),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("file should not exist"),
    }
}

#[test]
fn failing_sink_should_surface_io_errors() {
    let mut sink = MockSink::default();
    sink.expect_write().times(1).returning(|_buf| {
        let err = io::Error::from(ErrorKind::PermissionDenied);
        Result::Err(err)
    });

    let mut writer = CsvWriterBuilder::new()
        .from_writer(sink)
        .expect("options are valid");

    match writer.write_row(["a", "b"]) {
        Err(CsvError::Io(error)) => assert_eq!(error.kind(), ErrorKind::PermissionDenied),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(writer.lines(), 0);
}

#[test]
fn failing_flush_should_surface_on_close() {
    let mut sink = MockSink::default();
    sink.expect_write().returning(|buf| Ok(buf.len()));
    sink.expect_flush()
        .times(1)
        .returning(|| Err(io::Error::from(ErrorKind::BrokenPipe)));

    let mut writer = CsvWriterBuilder::new()
        .from_writer(sink)
        .expect("options are valid");
    writer.write_row(["a"]).expect("write succeeds");

    assert!(matches!(writer.close(), Err(CsvError::Io(_))));
}

#[test]
fn writing_after_close_should_fail() -> Result<(), Box<dyn Error>> {
    let mut writer = CsvWriterBuilder::new().from_writer(Vec::new())?;
    writer.close()?;
    writer.close()?;

    assert!(matches!(writer.write_row(["late"]), Err(CsvError::InvalidInput(_))));
    Ok(())
}

#[test]
fn unmappable_characters_should_fail_in_legacy_encodings() -> Result<(), Box<dyn Error>> {
    let options = CsvOptions::new().encoding("windows-1252");
    let mut writer = CsvWriterBuilder::new().options(&options).from_writer(Vec::new())?;
    writer.write_row(["café"])?;

    match writer.write_row(["ok", "日本"]) {
        Err(CsvError::UnmappableCharacter { encoding, line }) => {
            assert_eq!(encoding, "windows-1252");
            assert_eq!(line, 2);
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(writer.into_inner()?, b"caf\xE9\n");
    Ok(())
}
