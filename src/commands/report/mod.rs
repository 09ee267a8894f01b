mod rows;
mod run;

pub(crate) use run::run;
