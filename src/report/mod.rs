pub mod json;
pub mod table;

use crate::error::Result;
use crate::snippet::Snippet;

pub fn print_snippets(snippets: &[Snippet], json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", json::render_snippets(snippets)?);
    } else {
        print!("{}", table::render_snippets(snippets));
    }
    Ok(())
}

pub fn print_snippet(snippet: &Snippet, json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", json::render_snippet(snippet)?);
    } else {
        print!("{}", table::render_snippet(snippet));
    }
    Ok(())
}
