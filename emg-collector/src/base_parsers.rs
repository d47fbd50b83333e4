// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

//! Small composable char-stream parsers shared by the delimited-table
//! parser ([`crate::parser`]) and the fixed-shape manifest/ANC parsers.

use combine::{
    error::ParseError,
    many, satisfy,
    stream::Stream,
    sep_by1, token, Parser,
};

/// One delimited cell: everything up to (but not including) the delimiter
/// or a line ending.
pub(crate) fn cell<I>(delimiter: char) -> impl Parser<I, Output = String>
where
    I: Stream<Token = char>,
    I::Error: ParseError<I::Token, I::Range, I::Position>,
{
    many(satisfy(move |c: char| c != delimiter && c != '\n' && c != '\r'))
}

/// One delimited row: one or more cells separated by `delimiter`.
pub(crate) fn row<I>(delimiter: char) -> impl Parser<I, Output = Vec<String>>
where
    I: Stream<Token = char>,
    I::Error: ParseError<I::Token, I::Range, I::Position>,
{
    sep_by1(cell(delimiter), token(delimiter))
}

/// Strips a leading UTF-8 BOM, if present, returning the remainder.
pub(crate) fn strip_bom(s: &str) -> &str {
    s.strip_prefix('\u{feff}').unwrap_or(s)
}
