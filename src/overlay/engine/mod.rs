mod layout;
mod wrap;

pub use layout::{
    BLOCK_GAP, BUBBLE_LINE_GAP, BlockMetrics, CompositeLayout, LayoutBlock, STROKE_LINE_GAP,
    StandaloneLayout, calculate_text_metrics, composite_layout, stack_blocks, standalone_layout,
};
pub(crate) use layout::slot_name;
pub use wrap::{max_bubble_width, max_text_width, split_lines};
