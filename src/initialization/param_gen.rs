/// Writes the values of the first version of a model blob.
pub trait ParamGen {
    fn fill(&mut self, values: &mut [f32]);
}
