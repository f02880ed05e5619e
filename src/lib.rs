#![cfg_attr(docsrs, feature(doc_cfg))]

/*!
 # CSV Engine

 A streaming engine for delimiter-separated tabular text: a tokenizer state
 machine, a quoting writer, header-aware rows and tables, and a single-pass
 filter pipeline between them.

 ## Core Concepts

- **Reader:** pulls one [`Row`] at a time from any byte source, decoding it
  from the configured encoding on the way. Pulling is destructive and the
  reader cannot be rewound.
- **Writer:** serializes rows of arbitrary scalar [`Value`]s, quoting a field
  only when it contains a separator, the quote character or a line break.
- **Table:** a [`Header`] plus the rows keyed by it.
- **Filter:** reads, transforms and writes every row in one pass, with
  independent options on each side.
- **Sink Registry:** hands out the one live writer for a destination.

 ## Features

| **Feature** | **Description**                                                       |
|-------------|-----------------------------------------------------------------------|
| date        | Enables date and date-time values and converters (on by default)      |
| full        | Enables all available features                                        |

 ## Getting Started

```rust
# use csv_engine::{CsvError, CsvOptions, Converter, Row, Value, filter};
fn main() -> Result<(), CsvError> {
    let input = "1;2;3\n4;5\n";
    let mut output = Vec::new();

    let in_options = CsvOptions::new().col_sep(";").converter(Converter::Numeric);
    let out_options = CsvOptions::new();

    let result = filter(input.as_bytes(), &mut output, &in_options, &out_options, |row| {
        let mut doubled: Row = row
            .iter()
            .map(|value| match value {
                Value::Int(n) => Value::Int(n * 2),
                other => other.clone(),
            })
            .collect();
        doubled.push("Added\r");
        Ok(doubled)
    })?;

    assert_eq!(result.write_count, 2);
    assert_eq!(output, b"2,4,6,\"Added\r\"\n8,10,\"Added\r\"\n");
    Ok(())
}
```

 ## License
 Licensed under either of

 -   Apache License, Version 2.0
     ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
 -   MIT license
     ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)

 at your option.
 */

/// Reader / processor / writer seams and the filter pipeline
pub mod core;

/// Error types
pub mod error;

#[doc(inline)]
pub use error::*;

/// Reading and writing configuration
pub mod options;

#[doc(inline)]
pub use options::{CsvOptions, Formatter, Headers, RowSeparator};

/// Byte decoding and encoding
pub mod encoding;

/// Scalar field values
pub mod value;

#[doc(inline)]
pub use value::Value;

/// Field and header converters
pub mod convert;

#[doc(inline)]
pub use convert::{Converter, FieldInfo, HeaderConverter};

/// Rows, headers and tables
pub mod table;

#[doc(inline)]
pub use table::{Header, Row, Table};

/// Streaming reader and writer
pub mod stream;

/// Writers shared per destination
pub mod registry;

/// One-call entry points
pub mod api;

#[doc(inline)]
pub use api::*;
