pub mod clickhouse;
pub mod mysql;
pub mod postgres;

pub use clickhouse::ClickHouseSqlFormatter;
pub use mysql::MySqlFormatter;
pub use postgres::PostgreSqlFormatter;

/// Wraps `ident` in `quote`, doubling embedded quotes and removing NUL bytes.
pub(crate) fn quote_identifier(ident: &str, quote: char) -> String {
    let cleaned = ident.replace('\0', "");
    let doubled = cleaned.replace(quote, &format!("{}{}", quote, quote));
    format!("{}{}{}", quote, doubled, quote)
}
