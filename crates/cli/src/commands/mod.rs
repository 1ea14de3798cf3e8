pub(crate) mod fixup;
pub(crate) mod import;
