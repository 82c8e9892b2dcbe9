use std::collections::VecDeque;

use crate::{
    gaussian::resource::ResourceId,
    sort::{
        counting::{
            FillKeys,
            SortCore,
            fill_keys_sequential,
        },
        IntervalsPayload,
        SortMetric,
        SortParams,
        SortReply,
        SortService,
        SplatCenters,
    },
};


/// sorts on the calling thread, replies are delivered on the next poll
pub struct InlineSorter {
    core: SortCore,
    replies: VecDeque<SortReply>,
}

impl Default for InlineSorter {
    fn default() -> Self {
        Self::with_fill(Self::default_fill())
    }
}

impl InlineSorter {
    #[allow(unreachable_code)]
    pub fn default_fill() -> FillKeys {
        #[cfg(feature = "sort_rayon")]
        return crate::sort::rayon_sort::fill_keys_parallel;

        fill_keys_sequential
    }

    fn with_fill(fill: FillKeys) -> Self {
        Self {
            core: SortCore::new(fill),
            replies: VecDeque::new(),
        }
    }

    pub fn sequential() -> Self {
        Self::with_fill(fill_keys_sequential)
    }

    #[cfg(feature = "sort_rayon")]
    pub fn parallel() -> Self {
        Self::with_fill(crate::sort::rayon_sort::fill_keys_parallel)
    }

    pub fn registered(&self) -> usize {
        self.core.registered()
    }
}

impl SortService for InlineSorter {
    fn set_centers(&mut self, id: ResourceId, centers: Option<SplatCenters>) {
        self.core.set_centers(id, centers);
    }

    fn set_intervals(&mut self, payload: IntervalsPayload) {
        self.core.set_intervals(payload);
    }

    fn set_sort_params(&mut self, params: Vec<SortParams>, metric: SortMetric) {
        if let Some(reply) = self.core.sort(&params, metric) {
            self.replies.push_back(reply);
        }
    }

    fn poll_sorted(&mut self) -> Vec<SortReply> {
        self.replies.drain(..).collect()
    }
}
