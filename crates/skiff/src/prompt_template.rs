use include_dir::{include_dir, Dir};
use serde::Serialize;
use tera::{Context, Error as TeraError, Tera};

// Embed the prompt templates so rendering does not depend on the deploy layout
static PROMPT_FILES: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/prompts");

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

pub fn load_prompt_file<T: Serialize>(
    template_file: &str,
    context_data: &T,
) -> Result<String, TeraError> {
    let template_content = PROMPT_FILES
        .get_file(template_file)
        .and_then(|f| f.contents_utf8())
        .ok_or_else(|| TeraError::msg(format!("embedded template not found: {}", template_file)))?;
    load_prompt(template_content, context_data)
}
