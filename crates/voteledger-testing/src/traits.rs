use anyhow::Result;

pub trait Test {
    fn run(&self, n_votes: usize) -> Result<()>;
}
