use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use crate::config::{Catalog, Category};
use crate::error::{Error, Result};
use crate::models::{FeedbackBatch, Rating};

/// Split a `SUBCATEGORY=VALUE` argument at its first `=`.
pub fn parse_pair(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| Error::InvalidInput(format!("expected SUBCATEGORY=VALUE, got '{raw}'")))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::InvalidInput(format!("missing subcategory in '{raw}'")));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Match a subcategory by its full name or by its leading item code
/// (`"1.01"` for `"1.01 Organization chart"`).
pub fn resolve_subcategory<'a>(category: &'a Category, key: &str) -> Result<&'a str> {
    category
        .subcategories
        .iter()
        .find(|sub| sub.as_str() == key)
        .or_else(|| {
            category
                .subcategories
                .iter()
                .find(|sub| sub.split_whitespace().next() == Some(key))
        })
        .map(String::as_str)
        .ok_or_else(|| {
            Error::InvalidInput(format!("'{key}' is not a subcategory of '{}'", category.name))
        })
}

/// Validate raw entry input against the catalog and assemble the batch.
/// Nothing about the input is written anywhere; an error means no batch.
pub fn build_batch(
    catalog: &Catalog,
    audit_no: i64,
    project: &str,
    category: &str,
    ratings: &[(String, String)],
    comments: &[(String, String)],
) -> Result<FeedbackBatch> {
    if audit_no < 1 {
        return Err(Error::InvalidInput(format!(
            "audit number must be 1 or greater, got {audit_no}"
        )));
    }
    catalog.require_project(project)?;
    let category_def = catalog.category(category)?;

    if ratings.is_empty() {
        return Err(Error::InvalidInput("no ratings given".to_string()));
    }

    let mut rated = BTreeMap::new();
    for (key, label) in ratings {
        let subcategory = resolve_subcategory(category_def, key)?;
        let rating: Rating = label.parse()?;
        if rated.insert(subcategory.to_string(), rating).is_some() {
            return Err(Error::InvalidInput(format!("'{subcategory}' rated twice")));
        }
    }

    let mut noted = BTreeMap::new();
    for (key, comment) in comments {
        let subcategory = resolve_subcategory(category_def, key)?;
        if !rated.contains_key(subcategory) {
            return Err(Error::InvalidInput(format!(
                "comment given for unrated subcategory '{subcategory}'"
            )));
        }
        noted.insert(subcategory.to_string(), comment.clone());
    }

    Ok(FeedbackBatch {
        audit_no,
        project: project.to_string(),
        category: category.to_string(),
        ratings: rated,
        comments: noted,
    })
}

/// Use the ratings given on the command line, or prompt for a full category
/// when there are none. The project and category are checked first so a typo
/// fails before any question is asked.
pub fn collect_ratings<R, W>(
    catalog: &Catalog,
    project: &str,
    category: &str,
    ratings: Vec<(String, String)>,
    comments: Vec<(String, String)>,
    input: &mut R,
    output: &mut W,
) -> Result<(Vec<(String, String)>, Vec<(String, String)>)>
where
    R: BufRead,
    W: Write,
{
    catalog.require_project(project)?;
    let category_def = catalog.category(category)?;
    if !ratings.is_empty() {
        return Ok((ratings, comments));
    }
    prompt_ratings(category_def, input, output)
}

/// Ask for a rating and comment for every subcategory of `category`.
///
/// A rating answer is either its number in the menu or its label; invalid
/// answers are asked again. Running out of input before every subcategory is
/// rated is an error.
pub fn prompt_ratings<R, W>(
    category: &Category,
    input: &mut R,
    output: &mut W,
) -> Result<(Vec<(String, String)>, Vec<(String, String)>)>
where
    R: BufRead,
    W: Write,
{
    let menu = Rating::ALL
        .iter()
        .enumerate()
        .map(|(idx, r)| format!("[{}] {}", idx + 1, r))
        .collect::<Vec<_>>()
        .join("  ");

    let mut ratings = Vec::new();
    let mut comments = Vec::new();

    for subcategory in &category.subcategories {
        writeln!(output, "{subcategory}")?;
        let rating = loop {
            write!(output, "  rating {menu}: ")?;
            output.flush()?;
            let answer = read_answer(input, subcategory)?;
            match menu_choice(&answer) {
                Some(rating) => break rating,
                None => writeln!(output, "  '{answer}' is not a rating")?,
            }
        };

        write!(output, "  comment: ")?;
        output.flush()?;
        let comment = read_answer(input, subcategory)?;

        ratings.push((subcategory.clone(), rating.label().to_string()));
        if !comment.is_empty() {
            comments.push((subcategory.clone(), comment));
        }
    }

    Ok((ratings, comments))
}

fn read_answer<R: BufRead>(input: &mut R, subcategory: &str) -> Result<String> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(Error::InvalidInput(format!(
            "input ended before '{subcategory}' was rated"
        )));
    }
    Ok(line.trim().to_string())
}

fn menu_choice(answer: &str) -> Option<Rating> {
    match answer.parse::<usize>() {
        Ok(n) if (1..=Rating::ALL.len()).contains(&n) => Some(Rating::ALL[n - 1]),
        Ok(_) => None,
        Err(_) => Rating::from_label(answer),
    }
}
