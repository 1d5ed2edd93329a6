// Copyright (c) 2025 - Cowboy AI, Inc.
//! Database connection descriptor rewriting

use regex::{Captures, Regex};

use crate::errors::ProvisioningResult;

/// Matches the host inside `<url>...</url>`, after `//`, `@` or `@//`
const URL_HOST: &str = r"(<url>.*(@(//)?|//))([^:/]+)(.*</url>)";

/// Point every `<url>` element of a dbconfig descriptor at `host`
///
/// Protocol prefix, port, path and query survive untouched, as does the
/// rest of the document.
pub fn rewrite_database_url(descriptor: &str, host: &str) -> ProvisioningResult<String> {
    let pattern = Regex::new(URL_HOST)?;
    Ok(pattern
        .replace_all(descriptor, |caps: &Captures| {
            format!("{}{}{}", &caps[1], host, &caps[5])
        })
        .into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(
        "<url>jdbc:mysql://10.0.0.7:3306/jira?useUnicode=true</url>",
        "<url>jdbc:mysql://10.2.0.9:3306/jira?useUnicode=true</url>";
        "mysql with port and query"
    )]
    #[test_case(
        "<url>jdbc:postgresql://old-db/jira</url>",
        "<url>jdbc:postgresql://10.2.0.9/jira</url>";
        "postgres without port"
    )]
    #[test_case(
        "<url>jdbc:oracle:thin:@//old-db:1521/ORCL</url>",
        "<url>jdbc:oracle:thin:@//10.2.0.9:1521/ORCL</url>";
        "oracle service name"
    )]
    #[test_case(
        "<url>jdbc:oracle:thin:@old-db:1521:ORCL</url>",
        "<url>jdbc:oracle:thin:@10.2.0.9:1521:ORCL</url>";
        "oracle sid"
    )]
    fn test_host_is_replaced(before: &str, after: &str) {
        assert_eq!(rewrite_database_url(before, "10.2.0.9").unwrap(), after);
    }

    #[test]
    fn test_rest_of_descriptor_is_untouched() {
        let descriptor = "<jira-database-config>\n  <name>defaultDS</name>\n  <jdbc-datasource>\n    <url>jdbc:mysql://db:3306/jira</url>\n    <username>jira</username>\n  </jdbc-datasource>\n</jira-database-config>\n";
        let rewritten = rewrite_database_url(descriptor, "10.2.0.9").unwrap();
        assert_eq!(
            rewritten,
            descriptor.replace("jdbc:mysql://db:3306", "jdbc:mysql://10.2.0.9:3306")
        );
    }
}
