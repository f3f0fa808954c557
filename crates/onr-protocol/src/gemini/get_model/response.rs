use super::types::Model;

pub type GetModelResponse = Model;
