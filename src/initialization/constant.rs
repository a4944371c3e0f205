use super::ParamGen;

/// Starts every value of a model blob at `value`.
#[derive(Debug, Clone, Copy)]
pub struct ConstParamGen {
    value: f32,
}

impl ConstParamGen {
    pub fn new(value: f32) -> Self {
        Self { value }
    }
}

impl ParamGen for ConstParamGen {
    fn fill(&mut self, values: &mut [f32]) {
        values.fill(self.value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrites_every_value() {
        let mut values: [f32; 4] = [3.; 4];
        ConstParamGen::new(0.5).fill(&mut values);
        assert_eq!(values, [0.5; 4]);
    }
}
